//! Observation assembly: each raw sensor sample becomes a canonical
//! observation {z, per-axis validity, R, H} expressed in NED against the
//! full augmented state layout. Filter variants later select the columns
//! their state carries.
//!
//! # Canonical state layout (columns of H)
//! [p(0..3), v(3..6), b(6..9), aₜ(9..12), vₜ(12..15)]
//! where v is the relative velocity for non-augmented filters and the
//! vehicle velocity for the augmented one.
//!
//! No frame-mixed value leaves this module: every `z` is NED meters (or
//! NED m/s for the velocity observation).

use crate::frames::{self, SensorRotation};
use crate::msg::{
    FiducialMarkerReport, IrlockReport, MissionLandingPoint, TargetGnssReport, UwbDistance,
    VehicleGps,
};
use nalgebra::{Matrix3, SMatrix, Vector3};
use serde::{Deserialize, Serialize};

/// Canonical H column offsets.
pub mod layout {
    pub const POS: usize = 0;
    pub const VEL: usize = 3;
    pub const BIAS: usize = 6;
    pub const ACC: usize = 9;
    pub const TVEL: usize = 12;
    pub const DIM: usize = 15;
}

/// Which sensor produced an observation. Mission landing points are
/// assembled as pseudo target-GPS observations and share its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObsSource {
    TargetGpsPos,
    UavGpsVel,
    Vision,
    Irlock,
    Uwb,
}

impl ObsSource {
    /// True for sources that observe relative position (they refresh the
    /// estimator's update clock; the velocity source alone does not).
    pub fn is_position(self) -> bool {
        !matches!(self, ObsSource::UavGpsVel)
    }
}

/// A sensor sample in canonical form, ready for fusion.
#[derive(Clone, Debug)]
pub struct TargetObservation {
    pub source: ObsSource,
    pub timestamp: f64,
    /// Per-axis validity; exactly the true axes have H rows.
    pub valid: [bool; 3],
    /// Measurement (NED).
    pub z: Vector3<f64>,
    /// Measurement noise variance per axis (diagonal R).
    pub var: Vector3<f64>,
    /// Observation rows against the canonical layout.
    pub h: SMatrix<f64, 3, { layout::DIM }>,
}

impl TargetObservation {
    fn new(source: ObsSource, timestamp: f64) -> Self {
        Self {
            source,
            timestamp,
            valid: [false; 3],
            z: Vector3::zeros(),
            var: Vector3::zeros(),
            h: SMatrix::zeros(),
        }
    }

    /// Number of valid rows.
    pub fn rows(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }
}

/// Sensor-related configuration, derived from the estimator parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObservationConfig {
    pub scale_x: f64,
    pub scale_y: f64,
    /// IRLOCK/UWB measurement noise std.
    pub meas_unc: f64,
    pub gps_pos_noise: f64,
    pub gps_vel_noise: f64,
    pub ev_pos_noise: f64,
    /// True: vision noise from the parameter model; false: message
    /// covariance, floored at `ev_pos_noise²`.
    pub ev_noise_md: bool,
    pub sensor_rotation: SensorRotation,
    /// IRLOCK mount offset in the body frame (m).
    pub sensor_offset: [f64; 3],
}

/// Vehicle state snapshot the assembler transforms against, refreshed by
/// the orchestrator once per tick.
#[derive(Clone, Copy, Debug)]
pub struct VehicleContext {
    /// Attitude quaternion body→NED [w, x, y, z].
    pub q_att: [f64; 4],
    pub dist_bottom: f64,
    pub dist_bottom_valid: bool,
    pub gps: Option<VehicleGps>,
}

/// Converts raw sensor samples into [`TargetObservation`]s.
pub struct Assembler<'a> {
    cfg: &'a ObservationConfig,
    ctx: &'a VehicleContext,
}

impl<'a> Assembler<'a> {
    pub fn new(cfg: &'a ObservationConfig, ctx: &'a VehicleContext) -> Self {
        Self { cfg, ctx }
    }

    /// Target GNSS / mission landing position. When both inputs are given
    /// the two global positions are averaged; a lone mission point acts as
    /// a low-rate pseudo target fix. Observes p + b once the bias is set.
    pub fn target_gps(
        &self,
        target: Option<&TargetGnssReport>,
        mission: Option<&MissionLandingPoint>,
        bias_set: bool,
    ) -> Option<TargetObservation> {
        let gps = self.ctx.gps.as_ref()?;
        let (timestamp, lat, lon, alt) = match (target, mission) {
            (Some(t), Some(m)) if m.valid => (
                t.timestamp,
                (t.lat_deg + m.lat_deg) / 2.0,
                (t.lon_deg + m.lon_deg) / 2.0,
                (t.alt_m + m.alt_m) / 2.0,
            ),
            (Some(t), _) => (t.timestamp, t.lat_deg, t.lon_deg, t.alt_m),
            (None, Some(m)) if m.valid => (m.timestamp, m.lat_deg, m.lon_deg, m.alt_m),
            _ => return None,
        };

        let rel =
            frames::gps_ned_displacement(gps.lat_deg, gps.lon_deg, gps.alt_m, lat, lon, alt);
        if !rel.iter().all(|c| c.is_finite()) {
            return None;
        }

        let mut obs = TargetObservation::new(ObsSource::TargetGpsPos, timestamp);
        obs.z = self.scale_horizontal(rel);
        let hp = self.cfg.gps_pos_noise * self.cfg.gps_pos_noise;
        obs.var = Vector3::new(hp, hp, 4.0 * hp);
        for axis in 0..3 {
            obs.valid[axis] = true;
            obs.h[(axis, layout::POS + axis)] = 1.0;
            if bias_set {
                obs.h[(axis, layout::BIAS + axis)] = 1.0;
            }
        }
        Some(obs)
    }

    /// Vehicle GNSS velocity, observing the vehicle-velocity rows of the
    /// augmented state.
    pub fn uav_gps_vel(&self) -> Option<TargetObservation> {
        let gps = self.ctx.gps.as_ref()?;
        if !gps.vel_ned_valid {
            return None;
        }
        let mut obs = TargetObservation::new(ObsSource::UavGpsVel, gps.timestamp);
        obs.z = Vector3::from_row_slice(&gps.vel_ned);
        let v = self.cfg.gps_vel_noise * self.cfg.gps_vel_noise;
        obs.var = Vector3::new(v, v, v);
        for axis in 0..3 {
            obs.valid[axis] = true;
            obs.h[(axis, layout::VEL + axis)] = 1.0;
        }
        Some(obs)
    }

    /// Fiducial marker pose: sensor frame → body (mount rotation +
    /// offset) → NED (attitude). Does not observe the bias.
    pub fn vision(&self, marker: &FiducialMarkerReport) -> Option<TargetObservation> {
        if !marker.pos.iter().all(|c| c.is_finite()) {
            return None;
        }
        let s_att = self.cfg.sensor_rotation.to_matrix();
        let r_att = frames::attitude_rotation(&self.ctx.q_att);
        let offset = Vector3::from_row_slice(&self.cfg.sensor_offset);
        let body = s_att * Vector3::from_row_slice(&marker.pos) + offset;
        let ned = r_att * body;

        let floor = self.cfg.ev_pos_noise * self.cfg.ev_pos_noise;
        let var = match (self.cfg.ev_noise_md, marker.cov_diag) {
            (false, Some(diag)) => {
                // Rotate the sensor-frame covariance into NED and keep the
                // diagonal, floored at the parameter noise.
                let a = r_att.matrix() * s_att;
                let r_s = Matrix3::from_diagonal(&Vector3::from_row_slice(&diag));
                let r_ned = a * r_s * a.transpose();
                Vector3::new(
                    r_ned[(0, 0)].max(floor),
                    r_ned[(1, 1)].max(floor),
                    r_ned[(2, 2)].max(floor),
                )
            }
            _ => {
                let dist = if self.ctx.dist_bottom_valid {
                    self.ctx.dist_bottom.max(1.0)
                } else {
                    1.0
                };
                Vector3::new(floor * dist, floor * dist, floor * dist)
            }
        };

        let mut obs = TargetObservation::new(ObsSource::Vision, marker.timestamp);
        obs.z = self.scale_horizontal(ned);
        obs.var = var;
        for axis in 0..3 {
            obs.valid[axis] = true;
            obs.h[(axis, layout::POS + axis)] = 1.0;
        }
        Some(obs)
    }

    /// IR beacon lock: reconstruct the body-frame ray from the two
    /// tangent angles, rotate to NED and stretch it to the measured
    /// height above ground. Requires a valid distance-to-ground.
    pub fn irlock(&self, report: &IrlockReport) -> Option<TargetObservation> {
        if !self.ctx.dist_bottom_valid || !report.tan_x.is_finite() || !report.tan_y.is_finite()
        {
            return None;
        }

        let ray_sensor = Vector3::new(
            report.tan_x * self.cfg.scale_x,
            report.tan_y * self.cfg.scale_y,
            1.0,
        );
        let r_att = frames::attitude_rotation(&self.ctx.q_att);
        let ray_ned = r_att * (self.cfg.sensor_rotation.to_matrix() * ray_sensor);
        if ray_ned.z.abs() < 1e-6 {
            return None;
        }

        let dist_z = self.ctx.dist_bottom - self.cfg.sensor_offset[2];
        let offset_ned =
            r_att * Vector3::new(self.cfg.sensor_offset[0], self.cfg.sensor_offset[1], 0.0);

        let mut obs = TargetObservation::new(ObsSource::Irlock, report.timestamp);
        obs.z = Vector3::new(
            ray_ned.x / ray_ned.z * dist_z + offset_ned.x,
            ray_ned.y / ray_ned.z * dist_z + offset_ned.y,
            -dist_z,
        );
        let var = self.cfg.meas_unc * dist_z * self.cfg.meas_unc * dist_z;
        obs.var = Vector3::new(var, var, var);
        for axis in 0..3 {
            obs.valid[axis] = true;
            obs.h[(axis, layout::POS + axis)] = 1.0;
        }
        Some(obs)
    }

    /// UWB ranging: grid frame → body (grid yaw) → NED (attitude).
    pub fn uwb(&self, report: &UwbDistance) -> Option<TargetObservation> {
        if !report.position.iter().all(|c| c.is_finite()) {
            return None;
        }
        let body =
            frames::yaw_rotation(report.grid_yaw_rad) * Vector3::from_row_slice(&report.position);
        let ned = frames::attitude_rotation(&self.ctx.q_att) * body;

        let mut obs = TargetObservation::new(ObsSource::Uwb, report.timestamp);
        obs.z = self.scale_horizontal(ned);
        let var = self.cfg.meas_unc * self.cfg.meas_unc;
        obs.var = Vector3::new(var, var, var);
        for axis in 0..3 {
            obs.valid[axis] = true;
            obs.h[(axis, layout::POS + axis)] = 1.0;
        }
        Some(obs)
    }

    fn scale_horizontal(&self, mut v: Vector3<f64>) -> Vector3<f64> {
        v.x *= self.cfg.scale_x;
        v.y *= self.cfg.scale_y;
        v
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn cfg() -> ObservationConfig {
        ObservationConfig {
            scale_x: 1.0,
            scale_y: 1.0,
            meas_unc: 0.05,
            gps_pos_noise: 0.5,
            gps_vel_noise: 0.3,
            ev_pos_noise: 0.1,
            ev_noise_md: false,
            sensor_rotation: SensorRotation::None,
            sensor_offset: [0.0; 3],
        }
    }

    fn level_ctx() -> VehicleContext {
        VehicleContext {
            q_att: [1.0, 0.0, 0.0, 0.0],
            dist_bottom: 5.0,
            dist_bottom_valid: true,
            gps: Some(VehicleGps {
                timestamp: 0.0,
                lat_deg: 47.39,
                lon_deg: 8.55,
                alt_m: 490.0,
                vel_ned: [0.0; 3],
                vel_ned_valid: true,
            }),
        }
    }

    #[test]
    fn irlock_geometry_level_hover() {
        let cfg = cfg();
        let ctx = level_ctx();
        let obs = Assembler::new(&cfg, &ctx)
            .irlock(&IrlockReport {
                timestamp: 1.0,
                tan_x: 0.1,
                tan_y: 0.0,
                signal_quality: 1.0,
            })
            .unwrap();
        assert_abs_diff_eq!(obs.z.x, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(obs.z.y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(obs.z.z, -5.0, epsilon = 1e-9);
        // Angle noise projected to the ground plane.
        assert_abs_diff_eq!(obs.var.x, (0.05f64 * 5.0).powi(2), epsilon = 1e-12);
    }

    #[test]
    fn irlock_requires_distance_to_ground() {
        let cfg = cfg();
        let mut ctx = level_ctx();
        ctx.dist_bottom_valid = false;
        let report = IrlockReport {
            timestamp: 1.0,
            tan_x: 0.0,
            tan_y: 0.0,
            signal_quality: 1.0,
        };
        assert!(Assembler::new(&cfg, &ctx).irlock(&report).is_none());
    }

    #[test]
    fn vision_does_not_observe_bias() {
        let cfg = cfg();
        let ctx = level_ctx();
        let obs = Assembler::new(&cfg, &ctx)
            .vision(&FiducialMarkerReport {
                timestamp: 1.0,
                pos: [2.0, 0.0, 5.0],
                cov_diag: None,
            })
            .unwrap();
        for axis in 0..3 {
            assert_eq!(obs.h[(axis, layout::BIAS + axis)], 0.0);
            assert_eq!(obs.h[(axis, layout::POS + axis)], 1.0);
        }
        // Parameter noise model scales with height above ground.
        assert_abs_diff_eq!(obs.var.x, 0.1 * 0.1 * 5.0, epsilon = 1e-12);
    }

    #[test]
    fn vision_message_covariance_is_floored() {
        let cfg = cfg();
        let ctx = level_ctx();
        let obs = Assembler::new(&cfg, &ctx)
            .vision(&FiducialMarkerReport {
                timestamp: 1.0,
                pos: [0.0, 0.0, 5.0],
                cov_diag: Some([1e-9, 0.2, 0.3]),
            })
            .unwrap();
        assert_abs_diff_eq!(obs.var.x, 0.1 * 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(obs.var.y, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn target_gps_observes_position_plus_bias_once_set() {
        let cfg = cfg();
        let ctx = level_ctx();
        let (lat, lon, alt) =
            crate::frames::offset_gps(47.39, 8.55, 490.0, &Vector3::new(20.0, 0.0, 0.0));
        let report = TargetGnssReport {
            timestamp: 1.0,
            lat_deg: lat,
            lon_deg: lon,
            alt_m: alt,
            vel_ned: [0.0; 3],
            vel_ned_valid: false,
        };
        let asm = Assembler::new(&cfg, &ctx);
        let before = asm.target_gps(Some(&report), None, false).unwrap();
        assert_eq!(before.h[(0, layout::BIAS)], 0.0);
        let after = asm.target_gps(Some(&report), None, true).unwrap();
        assert_eq!(after.h[(0, layout::BIAS)], 1.0);
        assert_abs_diff_eq!(after.z.x, 20.0, epsilon = 1e-3);
        // Vertical GPS noise is doubled.
        assert_abs_diff_eq!(after.var.z, 4.0 * after.var.x, epsilon = 1e-12);
    }

    #[test]
    fn uwb_grid_yaw_is_undone() {
        let cfg = cfg();
        let ctx = level_ctx();
        let obs = Assembler::new(&cfg, &ctx)
            .uwb(&UwbDistance {
                timestamp: 1.0,
                position: [0.0, 1.0, 0.0],
                grid_yaw_rad: -std::f64::consts::FRAC_PI_2,
            })
            .unwrap();
        // Grid y with a −90° grid yaw is body x.
        assert_abs_diff_eq!(obs.z.x, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(obs.z.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn mask_matches_rows() {
        let cfg = cfg();
        let ctx = level_ctx();
        let obs = Assembler::new(&cfg, &ctx).uav_gps_vel().unwrap();
        assert_eq!(obs.rows(), 3);
        assert_eq!(obs.valid, [true; 3]);
        assert!(!obs.source.is_position());
    }
}
