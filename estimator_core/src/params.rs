//! Estimator configuration.
//!
//! Parameter storage and reload notification live outside the workspace;
//! the orchestrator receives a fresh [`EstimatorParams`] value and decides
//! whether the change is structural (forces a reset) or merely retunes
//! noise. Defaults follow the flight-tested values of the original
//! autopilot module.

use sensor_models::frames::SensorRotation;
use sensor_models::observation::ObservationConfig;
use serde::{Deserialize, Serialize};

/// Motion model of the landing target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMode {
    /// Target fixed in NED; observations may aid vehicle position.
    Static,
    /// Target may move; relative velocity and target acceleration are
    /// estimated.
    #[default]
    Moving,
    /// Moving target with separately estimated vehicle and target
    /// velocities. Requires (and forces) the coupled model.
    MovingAugmented,
}

/// Structure of the filter bank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetModel {
    /// Three independent per-axis filters, no cross-axis covariance.
    #[default]
    Decoupled,
    /// One filter spanning all three axes.
    Coupled,
}

// ---------------------------------------------------------------------------
// Sensor selection bitmask
// ---------------------------------------------------------------------------

/// Bitmask selecting which sensors feed the filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AidMask(pub u32);

impl AidMask {
    pub const TARGET_GPS_POS: AidMask = AidMask(1 << 0);
    pub const UAV_GPS_VEL: AidMask = AidMask(1 << 1);
    pub const VISION_POS: AidMask = AidMask(1 << 2);
    pub const IRLOCK_POS: AidMask = AidMask(1 << 3);
    pub const UWB_POS: AidMask = AidMask(1 << 4);
    pub const MISSION_POS: AidMask = AidMask(1 << 5);

    pub fn contains(self, other: AidMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for AidMask {
    type Output = AidMask;
    fn bitor(self, rhs: AidMask) -> AidMask {
        AidMask(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Full estimator configuration, reloaded at most once per tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimatorParams {
    pub aid_mask: AidMask,
    pub mode: TargetMode,
    pub model: TargetModel,

    /// Seconds without an accepted position update before the filter
    /// resets.
    pub btout: f64,

    /// Vehicle acceleration variance (m²/s⁴), process noise input.
    pub acc_d_unc: f64,
    /// Target acceleration variance (moving modes).
    pub acc_t_unc: f64,
    /// GPS bias random-walk intensity.
    pub bias_unc: f64,
    /// Per-axis clamp on the bias magnitude (m).
    pub bias_lim: f64,

    /// IRLOCK/UWB measurement noise std.
    pub meas_unc: f64,
    pub gps_pos_noise: f64,
    pub gps_vel_noise: f64,
    /// Vision angle noise std; consumed by the external yaw
    /// sub-estimator, carried here for configuration parity.
    pub ev_angle_noise: f64,
    pub ev_pos_noise: f64,
    pub ev_noise_md: bool,

    /// Initial variances at filter start.
    pub pos_unc_in: f64,
    pub vel_unc_in: f64,
    pub bias_unc_in: f64,
    pub acc_unc_in: f64,

    pub scale_x: f64,
    pub scale_y: f64,
    pub sens_rot: SensorRotation,
    pub sens_pos_x: f64,
    pub sens_pos_y: f64,
    pub sens_pos_z: f64,

    /// Apply the Mahalanobis gate (a failed gate is always reported in
    /// the innovation record either way).
    pub gate_rejection: bool,
    /// Optional scalar override of the per-dof χ² gate.
    pub nis_threshold: Option<f64>,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            aid_mask: AidMask::TARGET_GPS_POS | AidMask::UAV_GPS_VEL | AidMask::VISION_POS,
            mode: TargetMode::Moving,
            model: TargetModel::Decoupled,
            btout: 3.0,
            acc_d_unc: 1.0,
            acc_t_unc: 1.0,
            bias_unc: 0.05,
            bias_lim: 1.0,
            meas_unc: 0.05,
            gps_pos_noise: 0.5,
            gps_vel_noise: 0.3,
            ev_angle_noise: 0.05,
            ev_pos_noise: 0.1,
            ev_noise_md: false,
            pos_unc_in: 0.5,
            vel_unc_in: 0.5,
            bias_unc_in: 1.0,
            acc_unc_in: 0.1,
            scale_x: 1.0,
            scale_y: 1.0,
            sens_rot: SensorRotation::None,
            sens_pos_x: 0.0,
            sens_pos_y: 0.0,
            sens_pos_z: 0.0,
            gate_rejection: true,
            nis_threshold: None,
        }
    }
}

impl EstimatorParams {
    /// The model actually instantiated: the augmented mode has no
    /// decoupled form, so it forces the coupled model.
    pub fn effective_model(&self) -> TargetModel {
        if self.mode == TargetMode::MovingAugmented {
            TargetModel::Coupled
        } else {
            self.model
        }
    }

    /// True when switching from `old` requires tearing the filters down.
    pub fn structural_change(&self, old: &EstimatorParams) -> bool {
        self.mode != old.mode
            || self.effective_model() != old.effective_model()
            || self.aid_mask != old.aid_mask
    }

    /// Sensor-facing subset handed to the observation assembler.
    pub fn observation_config(&self) -> ObservationConfig {
        ObservationConfig {
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            meas_unc: self.meas_unc,
            gps_pos_noise: self.gps_pos_noise,
            gps_vel_noise: self.gps_vel_noise,
            ev_pos_noise: self.ev_pos_noise,
            ev_noise_md: self.ev_noise_md,
            sensor_rotation: self.sens_rot,
            sensor_offset: [self.sens_pos_x, self.sens_pos_y, self.sens_pos_z],
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
