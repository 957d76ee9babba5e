//! Coupled Kalman filters: one multivariate filter spanning all three
//! axes, with full cross-axis covariance.
//!
//! ## State vectors
//! - static:            x = [p(3), v(3), b(3)]                  (9)
//! - moving:            x = [p(3), v(3), b(3), aₜ(3)]           (12)
//! - moving augmented:  x = [p(3), vᵤ(3), b(3), aₜ(3), vₜ(3)]   (15)
//!
//! Non-augmented variants carry the relative velocity v; the augmented
//! variant estimates vehicle and target velocities separately and the
//! relative velocity is read as vₜ − vᵤ.
//!
//! Updates are vector-form: the observation's valid rows are fused in one
//! step with S⁻¹ computed in `f64` (LU), gated as a block.

use crate::gating;
use crate::types::{AxisFusion, GateConfig, InitialState, InitialVariance, ProcessNoise, Vec3};
use nalgebra::{DMatrix, DVector, SMatrix, SVector};
use sensor_models::observation::{layout, TargetObservation};

const MIN_INNOV_VAR: f64 = 1e-6;

/// Outcome of one coupled (vector) fusion: per-axis diagnostics plus a
/// single accept/reject decision for the whole block.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoupledFusion {
    pub axis: [AxisFusion; 3],
    pub fused: bool,
}

// ---------------------------------------------------------------------------
// Shared mean/covariance container
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Core<const N: usize> {
    x: SVector<f64, N>,
    p: SMatrix<f64, N, N>,
}

impl<const N: usize> Core<N> {
    fn predict(
        &mut self,
        f: &SMatrix<f64, N, N>,
        g: &SMatrix<f64, N, 3>,
        u: &Vec3,
        q_extra: &SMatrix<f64, N, N>,
        acc_d_unc: f64,
    ) {
        self.x = f * self.x + g * u;
        self.p = f * self.p * f.transpose() + (g * g.transpose()) * acc_d_unc + q_extra;
        self.symmetrize();
    }

    fn symmetrize(&mut self) {
        self.p = (self.p + self.p.transpose()) * 0.5;
    }

    /// Vector update over the observation's valid rows. `cols[i]` is the
    /// canonical column carried by state index i.
    fn fuse(&mut self, cols: &[usize], obs: &TargetObservation, gate: &GateConfig) -> CoupledFusion {
        let mut out = CoupledFusion::default();
        let rows: Vec<usize> = (0..3).filter(|&a| obs.valid[a]).collect();
        let m = rows.len();
        if m == 0 {
            return out;
        }

        let mut h = DMatrix::zeros(m, N);
        for (ri, &axis) in rows.iter().enumerate() {
            for (ci, &col) in cols.iter().enumerate() {
                h[(ri, ci)] = obs.h[(axis, col)];
            }
        }
        let z = DVector::from_iterator(m, rows.iter().map(|&a| obs.z[a]));
        let r = DMatrix::from_diagonal(&DVector::from_iterator(
            m,
            rows.iter().map(|&a| obs.var[a]),
        ));

        let p_dyn = DMatrix::from_fn(N, N, |rr, cc| self.p[(rr, cc)]);
        let x_dyn = DVector::from_fn(N, |i, _| self.x[i]);

        let hp = &h * &p_dyn;
        let s = &hp * h.transpose() + r;
        for (ri, &axis) in rows.iter().enumerate() {
            out.axis[axis].innovation_var = s[(ri, ri)];
        }
        if (0..m).any(|i| s[(i, i)] <= MIN_INNOV_VAR) {
            return out;
        }
        let s_inv = match s.clone().lu().try_inverse() {
            Some(inv) => inv,
            None => return out,
        };

        let y = z - &h * &x_dyn;
        let threshold = gate.nis_override.unwrap_or_else(|| gating::chi2_gate(m));
        let check = gating::check(&y, &s_inv, threshold);
        for (ri, &axis) in rows.iter().enumerate() {
            out.axis[axis].innovation = y[ri];
            out.axis[axis].test_ratio = check.test_ratio;
        }
        if gate.reject && !check.passes {
            return out;
        }

        let k = &p_dyn * h.transpose() * &s_inv;
        let x_new = x_dyn + &k * &y;
        let p_new = (DMatrix::identity(N, N) - &k * &h) * &p_dyn;

        self.x = SVector::from_fn(|i, _| x_new[i]);
        self.p = SMatrix::from_fn(|rr, cc| 0.5 * (p_new[(rr, cc)] + p_new[(cc, rr)]));

        out.fused = true;
        for &axis in &rows {
            out.axis[axis].fused = true;
        }
        out
    }

    fn clamp_bias(&mut self, lim: f64) {
        for i in 0..3 {
            self.x[layout::BIAS + i] = self.x[layout::BIAS + i].clamp(-lim, lim);
        }
    }

    fn is_finite(&self) -> bool {
        self.x.iter().all(|v| v.is_finite()) && self.p.iter().all(|v| v.is_finite())
    }

    fn segment(&self, offset: usize) -> Vec3 {
        Vec3::new(self.x[offset], self.x[offset + 1], self.x[offset + 2])
    }

    fn var_segment(&self, offset: usize) -> Vec3 {
        Vec3::new(
            self.p[(offset, offset)],
            self.p[(offset + 1, offset + 1)],
            self.p[(offset + 2, offset + 2)],
        )
    }
}

// ---------------------------------------------------------------------------
// Static target: [p, v, b]
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CoupledStatic {
    core: Core<9>,
}

impl CoupledStatic {
    const COLS: [usize; 9] = [0, 1, 2, 3, 4, 5, 6, 7, 8];

    pub fn new(init: &InitialState, var: &InitialVariance) -> Self {
        let mut x = SVector::<f64, 9>::zeros();
        let mut p = SMatrix::<f64, 9, 9>::zeros();
        for i in 0..3 {
            x[i] = init.pos[i];
            x[3 + i] = init.vel[i];
            x[6 + i] = init.bias[i];
            p[(i, i)] = var.pos;
            p[(3 + i, 3 + i)] = var.vel;
            p[(6 + i, 6 + i)] = var.bias;
        }
        Self { core: Core { x, p } }
    }

    pub fn predict(&mut self, dt: f64, acc_ned: &Vec3, noise: &ProcessNoise) {
        let mut f = SMatrix::<f64, 9, 9>::identity();
        let mut g = SMatrix::<f64, 9, 3>::zeros();
        let mut q = SMatrix::<f64, 9, 9>::zeros();
        for i in 0..3 {
            f[(i, 3 + i)] = dt;
            g[(i, i)] = -0.5 * dt * dt;
            g[(3 + i, i)] = -dt;
            q[(6 + i, 6 + i)] = noise.bias_unc * dt;
        }
        self.core.predict(&f, &g, acc_ned, &q, noise.acc_d_unc);
    }

    pub fn fuse(&mut self, obs: &TargetObservation, gate: &GateConfig) -> CoupledFusion {
        self.core.fuse(&Self::COLS, obs, gate)
    }

    pub fn clamp_bias(&mut self, lim: f64) {
        self.core.clamp_bias(lim);
    }
    pub fn is_finite(&self) -> bool {
        self.core.is_finite()
    }

    pub fn position(&self) -> Vec3 {
        self.core.segment(0)
    }
    pub fn velocity(&self) -> Vec3 {
        self.core.segment(3)
    }
    pub fn bias(&self) -> Vec3 {
        self.core.segment(6)
    }
    pub fn position_var(&self) -> Vec3 {
        self.core.var_segment(0)
    }
    pub fn velocity_var(&self) -> Vec3 {
        self.core.var_segment(3)
    }
    pub fn bias_var(&self) -> Vec3 {
        self.core.var_segment(6)
    }
}

// ---------------------------------------------------------------------------
// Moving target: [p, v, b, aₜ]
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CoupledMoving {
    core: Core<12>,
}

impl CoupledMoving {
    const COLS: [usize; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

    pub fn new(init: &InitialState, var: &InitialVariance) -> Self {
        let mut x = SVector::<f64, 12>::zeros();
        let mut p = SMatrix::<f64, 12, 12>::zeros();
        for i in 0..3 {
            x[i] = init.pos[i];
            x[3 + i] = init.vel[i];
            x[6 + i] = init.bias[i];
            x[9 + i] = init.target_acc[i];
            p[(i, i)] = var.pos;
            p[(3 + i, 3 + i)] = var.vel;
            p[(6 + i, 6 + i)] = var.bias;
            p[(9 + i, 9 + i)] = var.acc;
        }
        Self { core: Core { x, p } }
    }

    pub fn predict(&mut self, dt: f64, acc_ned: &Vec3, noise: &ProcessNoise) {
        let dt2 = dt * dt;
        let mut f = SMatrix::<f64, 12, 12>::identity();
        let mut g = SMatrix::<f64, 12, 3>::zeros();
        let mut q = SMatrix::<f64, 12, 12>::zeros();
        for i in 0..3 {
            f[(i, 3 + i)] = dt;
            f[(i, 9 + i)] = 0.5 * dt2;
            f[(3 + i, 9 + i)] = dt;
            g[(i, i)] = -0.5 * dt2;
            g[(3 + i, i)] = -dt;
            q[(6 + i, 6 + i)] = noise.bias_unc * dt;
        }
        target_acc_kernel(&mut q, noise.acc_t_unc, dt, 0, 3, 9);
        self.core.predict(&f, &g, acc_ned, &q, noise.acc_d_unc);
    }

    pub fn fuse(&mut self, obs: &TargetObservation, gate: &GateConfig) -> CoupledFusion {
        self.core.fuse(&Self::COLS, obs, gate)
    }

    pub fn clamp_bias(&mut self, lim: f64) {
        self.core.clamp_bias(lim);
    }
    pub fn is_finite(&self) -> bool {
        self.core.is_finite()
    }

    pub fn position(&self) -> Vec3 {
        self.core.segment(0)
    }
    pub fn velocity(&self) -> Vec3 {
        self.core.segment(3)
    }
    pub fn bias(&self) -> Vec3 {
        self.core.segment(6)
    }
    pub fn target_acc(&self) -> Vec3 {
        self.core.segment(9)
    }
    pub fn position_var(&self) -> Vec3 {
        self.core.var_segment(0)
    }
    pub fn velocity_var(&self) -> Vec3 {
        self.core.var_segment(3)
    }
    pub fn bias_var(&self) -> Vec3 {
        self.core.var_segment(6)
    }
    pub fn target_acc_var(&self) -> Vec3 {
        self.core.var_segment(9)
    }
}

// ---------------------------------------------------------------------------
// Moving target, augmented: [p, vᵤ, b, aₜ, vₜ]
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CoupledMovingAug {
    core: Core<15>,
}

impl CoupledMovingAug {
    const COLS: [usize; 15] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];

    pub fn new(init: &InitialState, var: &InitialVariance) -> Self {
        let mut x = SVector::<f64, 15>::zeros();
        let mut p = SMatrix::<f64, 15, 15>::zeros();
        for i in 0..3 {
            x[i] = init.pos[i];
            x[3 + i] = init.vel[i]; // vehicle velocity
            x[6 + i] = init.bias[i];
            x[9 + i] = init.target_acc[i];
            x[12 + i] = init.target_vel[i];
            p[(i, i)] = var.pos;
            p[(3 + i, 3 + i)] = var.vel;
            p[(6 + i, 6 + i)] = var.bias;
            p[(9 + i, 9 + i)] = var.acc;
            p[(12 + i, 12 + i)] = var.vel;
        }
        Self { core: Core { x, p } }
    }

    pub fn predict(&mut self, dt: f64, acc_ned: &Vec3, noise: &ProcessNoise) {
        let dt2 = dt * dt;
        let mut f = SMatrix::<f64, 15, 15>::identity();
        let mut g = SMatrix::<f64, 15, 3>::zeros();
        let mut q = SMatrix::<f64, 15, 15>::zeros();
        for i in 0..3 {
            // ṗ = vₜ − vᵤ + ½(aₜ − u)·dt
            f[(i, 3 + i)] = -dt;
            f[(i, 12 + i)] = dt;
            f[(i, 9 + i)] = 0.5 * dt2;
            // v̇ᵤ = u,  v̇ₜ = aₜ
            f[(12 + i, 9 + i)] = dt;
            g[(i, i)] = -0.5 * dt2;
            g[(3 + i, i)] = dt;
            q[(6 + i, 6 + i)] = noise.bias_unc * dt;
        }
        target_acc_kernel(&mut q, noise.acc_t_unc, dt, 0, 12, 9);
        self.core.predict(&f, &g, acc_ned, &q, noise.acc_d_unc);
    }

    pub fn fuse(&mut self, obs: &TargetObservation, gate: &GateConfig) -> CoupledFusion {
        self.core.fuse(&Self::COLS, obs, gate)
    }

    pub fn clamp_bias(&mut self, lim: f64) {
        self.core.clamp_bias(lim);
    }
    pub fn is_finite(&self) -> bool {
        self.core.is_finite()
    }

    pub fn position(&self) -> Vec3 {
        self.core.segment(0)
    }
    pub fn vehicle_velocity(&self) -> Vec3 {
        self.core.segment(3)
    }
    pub fn bias(&self) -> Vec3 {
        self.core.segment(6)
    }
    pub fn target_acc(&self) -> Vec3 {
        self.core.segment(9)
    }
    pub fn target_velocity(&self) -> Vec3 {
        self.core.segment(12)
    }

    /// Relative velocity vₜ − vᵤ.
    pub fn velocity(&self) -> Vec3 {
        self.target_velocity() - self.vehicle_velocity()
    }

    pub fn position_var(&self) -> Vec3 {
        self.core.var_segment(0)
    }

    /// Variance of the relative velocity, including the vᵤ/vₜ cross
    /// covariance.
    pub fn velocity_var(&self) -> Vec3 {
        let p = &self.core.p;
        Vec3::from_fn(|i, _| {
            p[(12 + i, 12 + i)] + p[(3 + i, 3 + i)] - 2.0 * p[(12 + i, 3 + i)]
        })
    }

    pub fn bias_var(&self) -> Vec3 {
        self.core.var_segment(6)
    }
    pub fn target_acc_var(&self) -> Vec3 {
        self.core.var_segment(9)
    }
}

/// Add the white-acceleration kernel of the target-acceleration random
/// walk: `pos`/`vel`/`acc` are the state offsets of the driven position,
/// velocity and acceleration blocks.
fn target_acc_kernel<const N: usize>(
    q: &mut SMatrix<f64, N, N>,
    intensity: f64,
    dt: f64,
    pos: usize,
    vel: usize,
    acc: usize,
) {
    let dt2 = dt * dt;
    let dt3 = dt2 * dt;
    let dt4 = dt3 * dt;
    let dt5 = dt4 * dt;
    for i in 0..3 {
        q[(pos + i, pos + i)] += intensity * dt5 / 20.0;
        q[(vel + i, vel + i)] += intensity * dt3 / 3.0;
        q[(acc + i, acc + i)] += intensity * dt;
        q[(pos + i, vel + i)] += intensity * dt4 / 8.0;
        q[(vel + i, pos + i)] += intensity * dt4 / 8.0;
        q[(pos + i, acc + i)] += intensity * dt3 / 6.0;
        q[(acc + i, pos + i)] += intensity * dt3 / 6.0;
        q[(vel + i, acc + i)] += intensity * dt2 / 2.0;
        q[(acc + i, vel + i)] += intensity * dt2 / 2.0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;
    use sensor_models::observation::{ObsSource, TargetObservation};

    fn noise() -> ProcessNoise {
        ProcessNoise {
            acc_d_unc: 1.0,
            acc_t_unc: 1.0,
            bias_unc: 0.05,
        }
    }

    fn gate() -> GateConfig {
        GateConfig {
            reject: true,
            nis_override: None,
        }
    }

    fn var() -> InitialVariance {
        InitialVariance {
            pos: 0.5,
            vel: 0.5,
            bias: 1.0,
            acc: 0.1,
        }
    }

    fn position_obs(z: Vec3, r: f64) -> TargetObservation {
        let mut obs = TargetObservation {
            source: ObsSource::Vision,
            timestamp: 0.0,
            valid: [true; 3],
            z,
            var: Vector3::new(r, r, r),
            h: nalgebra::SMatrix::zeros(),
        };
        for axis in 0..3 {
            obs.h[(axis, axis)] = 1.0;
        }
        obs
    }

    #[test]
    fn static_predict_integrates_input() {
        // Vehicle accelerating north at 1 m/s²; relative state decays
        // accordingly: p̈ = −u.
        let init = InitialState {
            pos: Vec3::new(10.0, 0.0, -5.0),
            ..Default::default()
        };
        let mut kf = CoupledStatic::new(&init, &var());
        let u = Vec3::new(1.0, 0.0, 0.0);
        kf.predict(0.5, &u, &noise());
        assert_abs_diff_eq!(kf.position().x, 10.0 - 0.5 * 0.25, epsilon = 1e-9);
        assert_abs_diff_eq!(kf.velocity().x, -0.5, epsilon = 1e-9);
    }

    #[test]
    fn predict_chaining_matches_single_step() {
        let init = InitialState {
            pos: Vec3::new(2.0, -1.0, -4.0),
            vel: Vec3::new(0.3, 0.0, 0.1),
            ..Default::default()
        };
        let u = Vec3::new(0.2, -0.1, 0.0);
        let mut once = CoupledMoving::new(&init, &var());
        let mut twice = once.clone();
        once.predict(0.4, &u, &noise());
        twice.predict(0.2, &u, &noise());
        twice.predict(0.2, &u, &noise());
        assert_abs_diff_eq!((once.position() - twice.position()).norm(), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!((once.velocity() - twice.velocity()).norm(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn vector_update_converges_all_axes() {
        // Start near the truth, as the orchestrator seeds the state from
        // the first observation.
        let init = InitialState {
            pos: Vec3::new(0.8, -1.8, -4.9),
            ..Default::default()
        };
        let mut kf = CoupledStatic::new(&init, &var());
        let truth = Vec3::new(1.0, -2.0, -5.0);
        for _ in 0..50 {
            kf.predict(0.02, &Vec3::zeros(), &noise());
            let out = kf.fuse(&position_obs(truth, 0.01), &gate());
            assert!(out.fused);
        }
        assert_abs_diff_eq!((kf.position() - truth).norm(), 0.0, epsilon = 0.05);
    }

    #[test]
    fn block_gate_rejects_outlier() {
        let init = InitialState::default();
        let mut kf = CoupledStatic::new(&init, &var());
        for _ in 0..20 {
            kf.predict(0.02, &Vec3::zeros(), &noise());
            kf.fuse(&position_obs(Vec3::zeros(), 0.01), &gate());
        }
        let before = kf.position();
        let out = kf.fuse(&position_obs(Vec3::new(30.0, 0.0, 0.0), 0.01), &gate());
        assert!(!out.fused);
        assert!(out.axis[0].test_ratio > 1.0);
        assert_abs_diff_eq!((kf.position() - before).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn augmented_velocity_bookkeeping() {
        let init = InitialState {
            pos: Vec3::new(10.0, 0.0, -5.0),
            vel: Vec3::new(2.0, 0.0, 0.0),        // vehicle velocity
            target_vel: Vec3::new(3.0, 0.0, 0.0), // target velocity
            ..Default::default()
        };
        let kf = CoupledMovingAug::new(&init, &var());
        assert_abs_diff_eq!(kf.velocity().x, 1.0, epsilon = 1e-12);
        // Relative-velocity variance sums both velocity blocks when they
        // are uncorrelated.
        assert_abs_diff_eq!(kf.velocity_var().x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn augmented_gps_velocity_updates_vehicle_rows() {
        let init = InitialState {
            pos: Vec3::new(10.0, 0.0, -5.0),
            ..Default::default()
        };
        let mut kf = CoupledMovingAug::new(&init, &var());
        let mut obs = TargetObservation {
            source: ObsSource::UavGpsVel,
            timestamp: 0.0,
            valid: [true; 3],
            z: Vec3::new(1.5, 0.0, 0.0),
            var: Vector3::new(0.09, 0.09, 0.09),
            h: nalgebra::SMatrix::zeros(),
        };
        for axis in 0..3 {
            obs.h[(axis, layout::VEL + axis)] = 1.0;
        }
        for _ in 0..50 {
            kf.predict(0.02, &Vec3::zeros(), &noise());
            kf.fuse(&obs, &gate());
        }
        assert_abs_diff_eq!(kf.vehicle_velocity().x, 1.5, epsilon = 0.1);
    }

    #[test]
    fn partial_mask_uses_matching_rows_only() {
        let init = InitialState::default();
        let mut kf = CoupledStatic::new(&init, &var());
        let mut obs = position_obs(Vec3::new(0.5, 99.0, -0.5), 0.01);
        obs.valid[1] = false; // y axis not measured
        let out = kf.fuse(&obs, &gate());
        assert!(out.fused);
        assert!(out.axis[0].fused && !out.axis[1].fused && out.axis[2].fused);
        assert_eq!(kf.velocity().y, 0.0);
    }
}
