//! Decoupled per-axis Kalman filters.
//!
//! Three independent instances (x, y, z) make up the decoupled bank; each
//! carries one axis of the relative state and ignores cross-axis
//! covariance. All math is `f64` via `nalgebra`.
//!
//! ## State vectors
//! - static target:  x = [p, v, b]
//! - moving target:  x = [p, v, b, aₜ]
//!
//! with p the relative position, v the relative velocity, b the GPS bias
//! and aₜ the target acceleration. The vehicle acceleration u enters as a
//! control input: v̇ = (aₜ) − u.

use crate::gating;
use crate::types::{AxisFusion, GateConfig, ProcessNoise};
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};

/// Innovation variance below this is treated as degenerate and the update
/// is skipped.
const MIN_INNOV_VAR: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Static target, one axis: [p, v, b]
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct AxisStatic {
    x: Vector3<f64>,
    p: Matrix3<f64>,
}

impl AxisStatic {
    pub fn new(pos: f64, vel: f64, bias: f64, var: [f64; 3]) -> Self {
        Self {
            x: Vector3::new(pos, vel, bias),
            p: Matrix3::from_diagonal(&Vector3::new(var[0], var[1], var[2])),
        }
    }

    fn transition(dt: f64) -> (Matrix3<f64>, Vector3<f64>) {
        let mut f = Matrix3::identity();
        f[(0, 1)] = dt;
        let g = Vector3::new(-0.5 * dt * dt, -dt, 0.0);
        (f, g)
    }

    pub fn predict(&mut self, dt: f64, acc: f64, noise: &ProcessNoise) {
        let (f, g) = Self::transition(dt);
        self.x = f * self.x + g * acc;

        let mut q = g * noise.acc_d_unc * g.transpose();
        q[(2, 2)] += noise.bias_unc * dt;
        self.p = f * self.p * f.transpose() + q;
        symmetrize3(&mut self.p);
    }

    /// Scalar update with observation row h over [p, v, b].
    pub fn update(&mut self, z: f64, r: f64, h: Vector3<f64>, gate: &GateConfig) -> AxisFusion {
        let ph = self.p * h;
        let s = h.dot(&ph) + r;
        let mut out = AxisFusion {
            innovation_var: s,
            ..Default::default()
        };
        if s <= MIN_INNOV_VAR {
            return out;
        }

        out.innovation = z - h.dot(&self.x);
        let threshold = gate.nis_override.unwrap_or_else(|| gating::chi2_gate(1));
        let check = gating::check_scalar(out.innovation, s, threshold);
        out.test_ratio = check.test_ratio;
        if gate.reject && !check.passes {
            return out;
        }

        let k = ph / s;
        self.x += k * out.innovation;
        self.p -= k * ph.transpose();
        symmetrize3(&mut self.p);
        out.fused = true;
        out
    }

    pub fn clamp_bias(&mut self, lim: f64) {
        self.x[2] = self.x[2].clamp(-lim, lim);
    }

    pub fn position(&self) -> f64 {
        self.x[0]
    }
    pub fn velocity(&self) -> f64 {
        self.x[1]
    }
    pub fn bias(&self) -> f64 {
        self.x[2]
    }
    pub fn position_var(&self) -> f64 {
        self.p[(0, 0)]
    }
    pub fn velocity_var(&self) -> f64 {
        self.p[(1, 1)]
    }
    pub fn bias_var(&self) -> f64 {
        self.p[(2, 2)]
    }

    pub fn is_finite(&self) -> bool {
        self.x.iter().all(|v| v.is_finite()) && self.p.iter().all(|v| v.is_finite())
    }

    #[cfg(test)]
    pub(crate) fn covariance(&self) -> &Matrix3<f64> {
        &self.p
    }
}

// ---------------------------------------------------------------------------
// Moving target, one axis: [p, v, b, aₜ]
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct AxisMoving {
    x: Vector4<f64>,
    p: Matrix4<f64>,
}

impl AxisMoving {
    pub fn new(pos: f64, vel: f64, bias: f64, acc: f64, var: [f64; 4]) -> Self {
        Self {
            x: Vector4::new(pos, vel, bias, acc),
            p: Matrix4::from_diagonal(&Vector4::new(var[0], var[1], var[2], var[3])),
        }
    }

    fn transition(dt: f64) -> (Matrix4<f64>, Vector4<f64>) {
        let mut f = Matrix4::identity();
        f[(0, 1)] = dt;
        f[(0, 3)] = 0.5 * dt * dt;
        f[(1, 3)] = dt;
        let g = Vector4::new(-0.5 * dt * dt, -dt, 0.0, 0.0);
        (f, g)
    }

    /// White-acceleration kernel of the target-acceleration random walk
    /// over [p, v, ·, aₜ].
    fn target_acc_noise(dt: f64, q: f64) -> Matrix4<f64> {
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;
        let dt5 = dt4 * dt;
        let mut m = Matrix4::zeros();
        m[(0, 0)] = q * dt5 / 20.0;
        m[(0, 1)] = q * dt4 / 8.0;
        m[(0, 3)] = q * dt3 / 6.0;
        m[(1, 1)] = q * dt3 / 3.0;
        m[(1, 3)] = q * dt2 / 2.0;
        m[(3, 3)] = q * dt;
        m[(1, 0)] = m[(0, 1)];
        m[(3, 0)] = m[(0, 3)];
        m[(3, 1)] = m[(1, 3)];
        m
    }

    pub fn predict(&mut self, dt: f64, acc: f64, noise: &ProcessNoise) {
        let (f, g) = Self::transition(dt);
        self.x = f * self.x + g * acc;

        let mut q = g * noise.acc_d_unc * g.transpose() + Self::target_acc_noise(dt, noise.acc_t_unc);
        q[(2, 2)] += noise.bias_unc * dt;
        self.p = f * self.p * f.transpose() + q;
        symmetrize4(&mut self.p);
    }

    /// Scalar update with observation row h over [p, v, b, aₜ].
    pub fn update(&mut self, z: f64, r: f64, h: Vector4<f64>, gate: &GateConfig) -> AxisFusion {
        let ph = self.p * h;
        let s = h.dot(&ph) + r;
        let mut out = AxisFusion {
            innovation_var: s,
            ..Default::default()
        };
        if s <= MIN_INNOV_VAR {
            return out;
        }

        out.innovation = z - h.dot(&self.x);
        let threshold = gate.nis_override.unwrap_or_else(|| gating::chi2_gate(1));
        let check = gating::check_scalar(out.innovation, s, threshold);
        out.test_ratio = check.test_ratio;
        if gate.reject && !check.passes {
            return out;
        }

        let k = ph / s;
        self.x += k * out.innovation;
        self.p -= k * ph.transpose();
        symmetrize4(&mut self.p);
        out.fused = true;
        out
    }

    pub fn clamp_bias(&mut self, lim: f64) {
        self.x[2] = self.x[2].clamp(-lim, lim);
    }

    pub fn position(&self) -> f64 {
        self.x[0]
    }
    pub fn velocity(&self) -> f64 {
        self.x[1]
    }
    pub fn bias(&self) -> f64 {
        self.x[2]
    }
    pub fn acceleration(&self) -> f64 {
        self.x[3]
    }
    pub fn position_var(&self) -> f64 {
        self.p[(0, 0)]
    }
    pub fn velocity_var(&self) -> f64 {
        self.p[(1, 1)]
    }
    pub fn bias_var(&self) -> f64 {
        self.p[(2, 2)]
    }
    pub fn acceleration_var(&self) -> f64 {
        self.p[(3, 3)]
    }

    pub fn is_finite(&self) -> bool {
        self.x.iter().all(|v| v.is_finite()) && self.p.iter().all(|v| v.is_finite())
    }
}

fn symmetrize3(p: &mut Matrix3<f64>) {
    *p = (*p + p.transpose()) * 0.5;
}

fn symmetrize4(p: &mut Matrix4<f64>) {
    *p = (*p + p.transpose()) * 0.5;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
