//! Subscribed message definitions.
//!
//! These structs are the data-flow boundary of the estimator: the message
//! bus, drivers and parameter storage live outside the workspace and hand
//! over plain timestamped values. All frames are stated per field; all
//! timestamps are seconds on the driver's monotonic clock.

use serde::{Deserialize, Serialize};

/// Vehicle attitude quaternion (Hamilton convention, [w, x, y, z]),
/// rotating body-frame vectors into NED.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VehicleAttitude {
    pub timestamp: f64,
    pub q: [f64; 4],
}

/// Vehicle specific force from the IMU, body frame (gravity not removed).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VehicleAcceleration {
    pub timestamp: f64,
    pub xyz: [f64; 3],
}

/// Vehicle local position in NED plus distance to ground.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VehicleLocalPosition {
    pub timestamp: f64,
    pub xy_valid: bool,
    pub xyz: [f64; 3],
    pub dist_bottom: f64,
    pub dist_bottom_valid: bool,
}

/// Vehicle GNSS fix. Velocity is NED.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VehicleGps {
    pub timestamp: f64,
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
    pub vel_ned: [f64; 3],
    pub vel_ned_valid: bool,
}

/// GNSS report from the receiver mounted on the landing target.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TargetGnssReport {
    pub timestamp: f64,
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
    pub vel_ned: [f64; 3],
    pub vel_ned_valid: bool,
}

/// IR beacon lock: tangents of the two bearing angles to the beacon in
/// the sensor frame (x forward, y right), unitless.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct IrlockReport {
    pub timestamp: f64,
    pub tan_x: f64,
    pub tan_y: f64,
    /// Detector quality in [0, 1]; 0 means no lock.
    pub signal_quality: f64,
}

/// UWB ranging solution: target position relative to the vehicle,
/// expressed in the UWB grid frame (grid x/y/z, rotated from body by
/// `grid_yaw` about the body z axis).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct UwbDistance {
    pub timestamp: f64,
    pub position: [f64; 3],
    pub grid_yaw_rad: f64,
}

/// Fiducial marker detection: target position relative to the vehicle in
/// the camera sensor frame, with an optional diagonal covariance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FiducialMarkerReport {
    pub timestamp: f64,
    pub pos: [f64; 3],
    pub cov_diag: Option<[f64; 3]>,
}

/// Landing point of the active mission plan (global frame).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MissionLandingPoint {
    pub timestamp: f64,
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
    pub valid: bool,
}
