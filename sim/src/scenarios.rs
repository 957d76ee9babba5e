//! Scenario definitions.
//!
//! Each scenario is a named configuration of target truth, sensor suite
//! and estimator parameters. All scenarios are deterministic given the
//! same seed, and mirror the flight situations the estimator must handle:
//! IRLOCK lock-on, moving-target vision tracking, GPS bias capture,
//! sensor loss, outliers and in-flight reconfiguration.

use crate::target::TargetTruth;
use estimator_core::params::{AidMask, EstimatorParams, TargetMode, TargetModel};
use serde::{Deserialize, Serialize};

/// Which pre-defined scenario to run.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// Static target straight below, IRLOCK only
    StaticIrlock,
    /// Target moving at 1 m/s, tracked by vision, coupled filter
    MovingVision,
    /// Vision + biased target GPS: the bias state must capture the offset
    GpsBias,
    /// All target sensors drop out mid-run; the filter must reset and
    /// re-acquire
    SensorTimeout,
    /// One vision outlier at 100× noise mid-run
    VisionOutlier,
    /// Static→Moving mode change mid-run
    ModeSwitch,
    /// Static target ranged by the UWB grid only
    UwbLanding,
}

/// Per-sensor emission config.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VisionCfg {
    pub rate_hz: f64,
    /// Uniform noise bound per axis (m).
    pub noise: f64,
    /// Emit one 100× outlier at this time.
    pub outlier_at: Option<f64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GpsCfg {
    pub rate_hz: f64,
    /// Constant offset injected into the target fix (the GPS bias the
    /// estimator is expected to identify).
    pub bias: [f64; 3],
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SensorSuite {
    pub irlock_rate_hz: Option<f64>,
    pub vision: Option<VisionCfg>,
    pub target_gps: Option<GpsCfg>,
    pub uwb_rate_hz: Option<f64>,
}

/// A fully configured simulation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub duration: f64,
    /// Scheduler tick (s); 0.02 matches the 50 Hz flight task.
    pub tick_dt: f64,
    pub params: EstimatorParams,
    /// Hover height above ground (m).
    pub vehicle_alt: f64,
    pub target: TargetTruth,
    pub sensors: SensorSuite,
    /// All target sensors silent within [start, end).
    pub dropout: Option<(f64, f64)>,
    /// Swap the target mode at this time.
    pub mode_switch: Option<(f64, TargetMode)>,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::StaticIrlock => Self::static_irlock(seed),
            ScenarioKind::MovingVision => Self::moving_vision(seed),
            ScenarioKind::GpsBias => Self::gps_bias(seed),
            ScenarioKind::SensorTimeout => Self::sensor_timeout(seed),
            ScenarioKind::VisionOutlier => Self::vision_outlier(seed),
            ScenarioKind::ModeSwitch => Self::mode_switch(seed),
            ScenarioKind::UwbLanding => Self::uwb_landing(seed),
        }
    }

    fn base(name: &str, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            seed,
            duration: 5.0,
            tick_dt: 0.02,
            params: EstimatorParams::default(),
            vehicle_alt: 5.0,
            target: TargetTruth::stationary([0.0, 0.0, -5.0]),
            sensors: SensorSuite::default(),
            dropout: None,
            mode_switch: None,
        }
    }

    fn static_irlock(seed: u64) -> Self {
        let mut s = Self::base("static_irlock", seed);
        s.duration = 2.0;
        s.params.mode = TargetMode::Static;
        s.params.model = TargetModel::Decoupled;
        s.params.aid_mask = AidMask::IRLOCK_POS;
        s.target = TargetTruth::stationary([0.5, 0.0, -5.0]);
        s.sensors.irlock_rate_hz = Some(50.0);
        s
    }

    fn moving_vision(seed: u64) -> Self {
        let mut s = Self::base("moving_vision", seed);
        s.params.mode = TargetMode::Moving;
        s.params.model = TargetModel::Coupled;
        s.params.aid_mask = AidMask::VISION_POS;
        // Ground vehicle at constant speed: little manoeuvre noise.
        s.params.acc_t_unc = 0.1;
        s.target = TargetTruth {
            pos0: [10.0, 0.0, -5.0],
            vel: [1.0, 0.0, 0.0],
        };
        s.sensors.vision = Some(VisionCfg {
            rate_hz: 20.0,
            noise: 0.1,
            outlier_at: None,
        });
        s
    }

    fn gps_bias(seed: u64) -> Self {
        let mut s = Self::base("gps_bias", seed);
        s.duration = 10.0;
        s.params.mode = TargetMode::Static;
        s.params.model = TargetModel::Decoupled;
        s.params.aid_mask = AidMask::TARGET_GPS_POS | AidMask::VISION_POS;
        s.target = TargetTruth::stationary([20.0, 0.0, 0.0]);
        s.sensors.vision = Some(VisionCfg {
            rate_hz: 20.0,
            noise: 0.05,
            outlier_at: None,
        });
        s.sensors.target_gps = Some(GpsCfg {
            rate_hz: 10.0,
            bias: [0.5, 0.3, 0.0],
        });
        s
    }

    fn sensor_timeout(seed: u64) -> Self {
        let mut s = Self::static_irlock(seed);
        s.name = "sensor_timeout".to_string();
        s.duration = 6.0;
        // Lock on for 1 s, silence for 4 s, re-acquire.
        s.dropout = Some((1.0, 5.0));
        s
    }

    fn vision_outlier(seed: u64) -> Self {
        let mut s = Self::base("vision_outlier", seed);
        s.params.mode = TargetMode::Static;
        s.params.model = TargetModel::Decoupled;
        s.params.aid_mask = AidMask::VISION_POS;
        s.target = TargetTruth::stationary([2.0, 0.0, -5.0]);
        s.sensors.vision = Some(VisionCfg {
            rate_hz: 20.0,
            noise: 0.05,
            outlier_at: Some(3.0),
        });
        s
    }

    fn mode_switch(seed: u64) -> Self {
        let mut s = Self::static_irlock(seed);
        s.name = "mode_switch".to_string();
        s.duration = 4.0;
        s.mode_switch = Some((2.0, TargetMode::Moving));
        s
    }

    fn uwb_landing(seed: u64) -> Self {
        let mut s = Self::base("uwb_landing", seed);
        s.duration = 3.0;
        s.params.mode = TargetMode::Static;
        s.params.model = TargetModel::Coupled;
        s.params.aid_mask = AidMask::UWB_POS;
        s.target = TargetTruth::stationary([1.0, -1.0, -5.0]);
        s.sensors.uwb_rate_hz = Some(10.0);
        s
    }
}
