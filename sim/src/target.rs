//! Ground-truth target motion.
//!
//! The simulated vehicle hovers level, so the target truth is expressed
//! directly as the relative NED position of the target w.r.t. the vehicle
//! (down negative when the target sits on the ground below).

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Constant-velocity target truth.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TargetTruth {
    /// Relative NED position at t = 0 (m).
    pub pos0: [f64; 3],
    /// Relative NED velocity (m/s).
    pub vel: [f64; 3],
}

impl TargetTruth {
    pub fn stationary(pos0: [f64; 3]) -> Self {
        Self {
            pos0,
            vel: [0.0; 3],
        }
    }

    pub fn position(&self, t: f64) -> Vector3<f64> {
        Vector3::from_row_slice(&self.pos0) + Vector3::from_row_slice(&self.vel) * t
    }

    pub fn velocity(&self) -> Vector3<f64> {
        Vector3::from_row_slice(&self.vel)
    }
}
