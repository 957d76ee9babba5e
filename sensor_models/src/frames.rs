//! Frame transforms: sensor mount rotations, body→NED attitude rotation,
//! gravity compensation and the flat-earth GNSS projection.
//!
//! Convention: NED (north-east-down), meters. Attitude quaternions are
//! Hamilton [w, x, y, z] rotating body vectors into NED.

use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the flat-earth projection (m).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Standard gravity (m/s²).
pub const GRAVITY_MSS: f64 = 9.807;

// ---------------------------------------------------------------------------
// Sensor mount rotation
// ---------------------------------------------------------------------------

/// Discrete mount rotation of a sensor relative to the body frame.
/// Indices match the autopilot rotation enumeration for the values carried
/// here (0..=8).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorRotation {
    #[default]
    None,
    Yaw45,
    Yaw90,
    Yaw135,
    Yaw180,
    Yaw225,
    Yaw270,
    Yaw315,
    Roll180,
}

impl SensorRotation {
    /// Decode the configuration integer. Unknown indices map to `None`.
    pub fn from_index(idx: i32) -> Self {
        match idx {
            1 => Self::Yaw45,
            2 => Self::Yaw90,
            3 => Self::Yaw135,
            4 => Self::Yaw180,
            5 => Self::Yaw225,
            6 => Self::Yaw270,
            7 => Self::Yaw315,
            8 => Self::Roll180,
            _ => Self::None,
        }
    }

    /// Rotation matrix taking sensor-frame vectors into the body frame.
    pub fn to_matrix(self) -> Matrix3<f64> {
        let (roll, yaw): (f64, f64) = match self {
            Self::None => (0.0, 0.0),
            Self::Yaw45 => (0.0, 45.0),
            Self::Yaw90 => (0.0, 90.0),
            Self::Yaw135 => (0.0, 135.0),
            Self::Yaw180 => (0.0, 180.0),
            Self::Yaw225 => (0.0, 225.0),
            Self::Yaw270 => (0.0, 270.0),
            Self::Yaw315 => (0.0, 315.0),
            Self::Roll180 => (180.0, 0.0),
        };
        Rotation3::from_euler_angles(roll.to_radians(), 0.0, yaw.to_radians()).into_inner()
    }
}

// ---------------------------------------------------------------------------
// Attitude
// ---------------------------------------------------------------------------

/// Build the body→NED rotation from a raw attitude quaternion.
pub fn attitude_rotation(q: &[f64; 4]) -> Rotation3<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(q[0], q[1], q[2], q[3])).to_rotation_matrix()
}

/// Rotation about the body z axis (used for the UWB grid orientation).
pub fn yaw_rotation(yaw_rad: f64) -> Rotation3<f64> {
    Rotation3::from_euler_angles(0.0, 0.0, yaw_rad)
}

/// Transform an IMU specific-force sample into NED kinematic acceleration:
/// rotate to NED and remove gravity (the accelerometer at rest reads −g).
pub fn acceleration_ned(q: &[f64; 4], acc_body: &Vector3<f64>) -> Vector3<f64> {
    attitude_rotation(q) * acc_body + Vector3::new(0.0, 0.0, GRAVITY_MSS)
}

// ---------------------------------------------------------------------------
// Flat-earth GNSS projection
// ---------------------------------------------------------------------------

/// NED displacement from the vehicle fix to the target fix using a
/// small-angle equirectangular projection centred on the vehicle.
/// The down component is positive when the target is below the vehicle.
pub fn gps_ned_displacement(
    veh_lat_deg: f64,
    veh_lon_deg: f64,
    veh_alt_m: f64,
    tgt_lat_deg: f64,
    tgt_lon_deg: f64,
    tgt_alt_m: f64,
) -> Vector3<f64> {
    let d_lat = (tgt_lat_deg - veh_lat_deg).to_radians();
    let d_lon = (tgt_lon_deg - veh_lon_deg).to_radians();
    Vector3::new(
        d_lat * EARTH_RADIUS_M,
        d_lon * EARTH_RADIUS_M * veh_lat_deg.to_radians().cos(),
        veh_alt_m - tgt_alt_m,
    )
}

/// Inverse of [`gps_ned_displacement`]: offset a reference fix by a NED
/// displacement. Used by the simulator to synthesize target fixes.
pub fn offset_gps(
    lat_deg: f64,
    lon_deg: f64,
    alt_m: f64,
    ned: &Vector3<f64>,
) -> (f64, f64, f64) {
    let lat = lat_deg + (ned.x / EARTH_RADIUS_M).to_degrees();
    let lon = lon_deg + (ned.y / (EARTH_RADIUS_M * lat_deg.to_radians().cos())).to_degrees();
    (lat, lon, alt_m - ned.z)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn body_ned_round_trip() {
        // Arbitrary attitude: transforming a vector NED→body→NED must be
        // the identity to well below measurement resolution.
        let q_raw = Quaternion::new(0.82, 0.1, -0.3, 0.47);
        let q = UnitQuaternion::from_quaternion(q_raw);
        let qa = [q.w, q.i, q.j, q.k];
        let r = attitude_rotation(&qa);
        let v = Vector3::new(1.25, -0.5, 3.0);
        let round = r * (r.inverse() * v);
        assert_abs_diff_eq!((round - v).norm(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn mount_rotation_yaw90() {
        let m = SensorRotation::Yaw90.to_matrix();
        // Sensor x axis points along body y after a 90° yaw.
        let v = m * Vector3::new(1.0, 0.0, 0.0);
        assert_abs_diff_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn stationary_vehicle_has_zero_ned_acceleration() {
        // Level vehicle at rest: the IMU reads −g on the body z axis.
        let q = [1.0, 0.0, 0.0, 0.0];
        let acc = acceleration_ned(&q, &Vector3::new(0.0, 0.0, -GRAVITY_MSS));
        assert_abs_diff_eq!(acc.norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn gps_projection_round_trip() {
        let ned = Vector3::new(120.0, -45.0, 8.0);
        let (lat, lon, alt) = offset_gps(47.39, 8.55, 490.0, &ned);
        let back = gps_ned_displacement(47.39, 8.55, 490.0, lat, lon, alt);
        assert_abs_diff_eq!((back - ned).norm(), 0.0, epsilon = 1e-3);
    }
}
