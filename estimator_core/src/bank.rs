//! The filter bank: one of five concrete filter instantiations selected
//! from {decoupled, coupled} × {static, moving} plus the augmented
//! coupled variant, behind a single predict/fuse/read interface.
//!
//! Variants differ in state size, so each is a separate type and the
//! bank is a tagged enum — no growable state vector, no inheritance.

use crate::coupled::{CoupledMoving, CoupledMovingAug, CoupledStatic};
use crate::decoupled::{AxisMoving, AxisStatic};
use crate::params::{TargetMode, TargetModel};
use crate::types::{AxisFusion, GateConfig, InitialState, InitialVariance, ProcessNoise, Vec3};
use nalgebra::{Vector3, Vector4};
use sensor_models::observation::{layout, TargetObservation};

/// Largest predict gap the bank will integrate; the orchestrator resets
/// on anything longer.
pub const MAX_PREDICT_DT: f64 = 1.0;

/// Per-observation fusion outcome, merged across axes/variants.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObservationFusion {
    pub axis: [AxisFusion; 3],
    /// Which axes had a measurement row.
    pub fusion_enabled: [bool; 3],
    /// All measured axes were accepted (the filter counts as updated).
    pub fused: bool,
}

#[derive(Clone, Debug)]
pub enum FilterBank {
    DecoupledStatic(Box<[AxisStatic; 3]>),
    DecoupledMoving(Box<[AxisMoving; 3]>),
    CoupledStatic(Box<CoupledStatic>),
    CoupledMoving(Box<CoupledMoving>),
    CoupledMovingAug(Box<CoupledMovingAug>),
}

impl FilterBank {
    /// Instantiate the variant for the configured mode/model with the
    /// given initial state and per-substate variances.
    pub fn start(
        mode: TargetMode,
        model: TargetModel,
        init: &InitialState,
        var: &InitialVariance,
    ) -> Self {
        match (mode, model) {
            (TargetMode::Static, TargetModel::Decoupled) => {
                let axes = std::array::from_fn(|i| {
                    AxisStatic::new(
                        init.pos[i],
                        init.vel[i],
                        init.bias[i],
                        [var.pos, var.vel, var.bias],
                    )
                });
                FilterBank::DecoupledStatic(Box::new(axes))
            }
            (TargetMode::Moving, TargetModel::Decoupled) => {
                let axes = std::array::from_fn(|i| {
                    AxisMoving::new(
                        init.pos[i],
                        init.vel[i],
                        init.bias[i],
                        init.target_acc[i],
                        [var.pos, var.vel, var.bias, var.acc],
                    )
                });
                FilterBank::DecoupledMoving(Box::new(axes))
            }
            (TargetMode::Static, TargetModel::Coupled) => {
                FilterBank::CoupledStatic(Box::new(CoupledStatic::new(init, var)))
            }
            (TargetMode::Moving, TargetModel::Coupled) => {
                FilterBank::CoupledMoving(Box::new(CoupledMoving::new(init, var)))
            }
            // The augmented mode has no decoupled form; the orchestrator
            // already forced the coupled model.
            (TargetMode::MovingAugmented, _) => {
                FilterBank::CoupledMovingAug(Box::new(CoupledMovingAug::new(init, var)))
            }
        }
    }

    /// Propagate all filters by `dt` (clipped to [0, MAX_PREDICT_DT])
    /// with the NED vehicle acceleration as input.
    pub fn predict(&mut self, dt: f64, acc_ned: &Vec3, noise: &ProcessNoise) {
        let dt = dt.clamp(0.0, MAX_PREDICT_DT);
        match self {
            FilterBank::DecoupledStatic(axes) => {
                for (i, axis) in axes.iter_mut().enumerate() {
                    axis.predict(dt, acc_ned[i], noise);
                }
            }
            FilterBank::DecoupledMoving(axes) => {
                for (i, axis) in axes.iter_mut().enumerate() {
                    axis.predict(dt, acc_ned[i], noise);
                }
            }
            FilterBank::CoupledStatic(kf) => kf.predict(dt, acc_ned, noise),
            FilterBank::CoupledMoving(kf) => kf.predict(dt, acc_ned, noise),
            FilterBank::CoupledMovingAug(kf) => kf.predict(dt, acc_ned, noise),
        }
    }

    /// Fuse one canonical observation.
    pub fn fuse(&mut self, obs: &TargetObservation, gate: &GateConfig) -> ObservationFusion {
        let mut out = ObservationFusion {
            fusion_enabled: obs.valid,
            ..Default::default()
        };
        match self {
            FilterBank::DecoupledStatic(axes) => {
                for (i, axis) in axes.iter_mut().enumerate() {
                    if !obs.valid[i] {
                        continue;
                    }
                    let h = Vector3::new(
                        obs.h[(i, layout::POS + i)],
                        obs.h[(i, layout::VEL + i)],
                        obs.h[(i, layout::BIAS + i)],
                    );
                    out.axis[i] = axis.update(obs.z[i], obs.var[i], h, gate);
                }
            }
            FilterBank::DecoupledMoving(axes) => {
                for (i, axis) in axes.iter_mut().enumerate() {
                    if !obs.valid[i] {
                        continue;
                    }
                    let h = Vector4::new(
                        obs.h[(i, layout::POS + i)],
                        obs.h[(i, layout::VEL + i)],
                        obs.h[(i, layout::BIAS + i)],
                        obs.h[(i, layout::ACC + i)],
                    );
                    out.axis[i] = axis.update(obs.z[i], obs.var[i], h, gate);
                }
            }
            FilterBank::CoupledStatic(kf) => out.axis = kf.fuse(obs, gate).axis,
            FilterBank::CoupledMoving(kf) => out.axis = kf.fuse(obs, gate).axis,
            FilterBank::CoupledMovingAug(kf) => out.axis = kf.fuse(obs, gate).axis,
        }
        out.fused = (0..3).all(|i| !obs.valid[i] || out.axis[i].fused) && obs.rows() > 0;
        out
    }

    /// Project the bias back inside ±lim on every axis.
    pub fn clamp_bias(&mut self, lim: f64) {
        match self {
            FilterBank::DecoupledStatic(axes) => axes.iter_mut().for_each(|a| a.clamp_bias(lim)),
            FilterBank::DecoupledMoving(axes) => axes.iter_mut().for_each(|a| a.clamp_bias(lim)),
            FilterBank::CoupledStatic(kf) => kf.clamp_bias(lim),
            FilterBank::CoupledMoving(kf) => kf.clamp_bias(lim),
            FilterBank::CoupledMovingAug(kf) => kf.clamp_bias(lim),
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            FilterBank::DecoupledStatic(axes) => axes.iter().all(|a| a.is_finite()),
            FilterBank::DecoupledMoving(axes) => axes.iter().all(|a| a.is_finite()),
            FilterBank::CoupledStatic(kf) => kf.is_finite(),
            FilterBank::CoupledMoving(kf) => kf.is_finite(),
            FilterBank::CoupledMovingAug(kf) => kf.is_finite(),
        }
    }

    // -----------------------------------------------------------------------
    // State readout
    // -----------------------------------------------------------------------

    pub fn position(&self) -> Vec3 {
        match self {
            FilterBank::DecoupledStatic(a) => Vec3::from_fn(|i, _| a[i].position()),
            FilterBank::DecoupledMoving(a) => Vec3::from_fn(|i, _| a[i].position()),
            FilterBank::CoupledStatic(kf) => kf.position(),
            FilterBank::CoupledMoving(kf) => kf.position(),
            FilterBank::CoupledMovingAug(kf) => kf.position(),
        }
    }

    /// Relative velocity of the target w.r.t. the vehicle.
    pub fn velocity(&self) -> Vec3 {
        match self {
            FilterBank::DecoupledStatic(a) => Vec3::from_fn(|i, _| a[i].velocity()),
            FilterBank::DecoupledMoving(a) => Vec3::from_fn(|i, _| a[i].velocity()),
            FilterBank::CoupledStatic(kf) => kf.velocity(),
            FilterBank::CoupledMoving(kf) => kf.velocity(),
            FilterBank::CoupledMovingAug(kf) => kf.velocity(),
        }
    }

    pub fn bias(&self) -> Vec3 {
        match self {
            FilterBank::DecoupledStatic(a) => Vec3::from_fn(|i, _| a[i].bias()),
            FilterBank::DecoupledMoving(a) => Vec3::from_fn(|i, _| a[i].bias()),
            FilterBank::CoupledStatic(kf) => kf.bias(),
            FilterBank::CoupledMoving(kf) => kf.bias(),
            FilterBank::CoupledMovingAug(kf) => kf.bias(),
        }
    }

    /// Target acceleration (moving variants only).
    pub fn target_acc(&self) -> Option<Vec3> {
        match self {
            FilterBank::DecoupledMoving(a) => Some(Vec3::from_fn(|i, _| a[i].acceleration())),
            FilterBank::CoupledMoving(kf) => Some(kf.target_acc()),
            FilterBank::CoupledMovingAug(kf) => Some(kf.target_acc()),
            _ => None,
        }
    }

    /// Target velocity (augmented variant only).
    pub fn target_velocity(&self) -> Option<Vec3> {
        match self {
            FilterBank::CoupledMovingAug(kf) => Some(kf.target_velocity()),
            _ => None,
        }
    }

    pub fn position_var(&self) -> Vec3 {
        match self {
            FilterBank::DecoupledStatic(a) => Vec3::from_fn(|i, _| a[i].position_var()),
            FilterBank::DecoupledMoving(a) => Vec3::from_fn(|i, _| a[i].position_var()),
            FilterBank::CoupledStatic(kf) => kf.position_var(),
            FilterBank::CoupledMoving(kf) => kf.position_var(),
            FilterBank::CoupledMovingAug(kf) => kf.position_var(),
        }
    }

    pub fn velocity_var(&self) -> Vec3 {
        match self {
            FilterBank::DecoupledStatic(a) => Vec3::from_fn(|i, _| a[i].velocity_var()),
            FilterBank::DecoupledMoving(a) => Vec3::from_fn(|i, _| a[i].velocity_var()),
            FilterBank::CoupledStatic(kf) => kf.velocity_var(),
            FilterBank::CoupledMoving(kf) => kf.velocity_var(),
            FilterBank::CoupledMovingAug(kf) => kf.velocity_var(),
        }
    }

    pub fn bias_var(&self) -> Vec3 {
        match self {
            FilterBank::DecoupledStatic(a) => Vec3::from_fn(|i, _| a[i].bias_var()),
            FilterBank::DecoupledMoving(a) => Vec3::from_fn(|i, _| a[i].bias_var()),
            FilterBank::CoupledStatic(kf) => kf.bias_var(),
            FilterBank::CoupledMoving(kf) => kf.bias_var(),
            FilterBank::CoupledMovingAug(kf) => kf.bias_var(),
        }
    }

    pub fn target_acc_var(&self) -> Option<Vec3> {
        match self {
            FilterBank::DecoupledMoving(a) => Some(Vec3::from_fn(|i, _| a[i].acceleration_var())),
            FilterBank::CoupledMoving(kf) => Some(kf.target_acc_var()),
            FilterBank::CoupledMovingAug(kf) => Some(kf.target_acc_var()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use sensor_models::observation::ObsSource;

    fn start(mode: TargetMode, model: TargetModel) -> FilterBank {
        let init = InitialState {
            pos: Vec3::new(1.0, 2.0, -5.0),
            ..Default::default()
        };
        let var = InitialVariance {
            pos: 0.5,
            vel: 0.5,
            bias: 1.0,
            acc: 0.1,
        };
        FilterBank::start(mode, model, &init, &var)
    }

    #[test]
    fn selection_matches_configuration() {
        assert!(matches!(
            start(TargetMode::Static, TargetModel::Decoupled),
            FilterBank::DecoupledStatic(_)
        ));
        assert!(matches!(
            start(TargetMode::Moving, TargetModel::Coupled),
            FilterBank::CoupledMoving(_)
        ));
        assert!(matches!(
            start(TargetMode::MovingAugmented, TargetModel::Coupled),
            FilterBank::CoupledMovingAug(_)
        ));
    }

    #[test]
    fn moving_variants_expose_acceleration() {
        assert!(start(TargetMode::Static, TargetModel::Decoupled)
            .target_acc()
            .is_none());
        assert!(start(TargetMode::Moving, TargetModel::Decoupled)
            .target_acc()
            .is_some());
        assert!(start(TargetMode::MovingAugmented, TargetModel::Coupled)
            .target_velocity()
            .is_some());
    }

    #[test]
    fn decoupled_and_coupled_agree_on_position_observations() {
        // With identical diagonal setups the decoupled and coupled static
        // filters are the same math, so their estimates must match.
        let mut dec = start(TargetMode::Static, TargetModel::Decoupled);
        let mut cou = start(TargetMode::Static, TargetModel::Coupled);
        let noise = ProcessNoise {
            acc_d_unc: 1.0,
            acc_t_unc: 0.0,
            bias_unc: 0.05,
        };
        let gate = GateConfig {
            reject: true,
            nis_override: None,
        };
        let mut obs = TargetObservation {
            source: ObsSource::Vision,
            timestamp: 0.0,
            valid: [true; 3],
            z: Vec3::new(1.2, 1.8, -5.1),
            var: Vec3::new(0.02, 0.02, 0.02),
            h: nalgebra::SMatrix::zeros(),
        };
        for axis in 0..3 {
            obs.h[(axis, layout::POS + axis)] = 1.0;
        }
        for _ in 0..30 {
            let u = Vec3::zeros();
            dec.predict(0.02, &u, &noise);
            cou.predict(0.02, &u, &noise);
            dec.fuse(&obs, &gate);
            cou.fuse(&obs, &gate);
        }
        assert_abs_diff_eq!((dec.position() - cou.position()).norm(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!((dec.velocity() - cou.velocity()).norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn predict_clips_oversized_dt() {
        let mut bank = start(TargetMode::Static, TargetModel::Decoupled);
        let mut reference = bank.clone();
        let noise = ProcessNoise {
            acc_d_unc: 1.0,
            acc_t_unc: 0.0,
            bias_unc: 0.05,
        };
        bank.predict(10.0, &Vec3::zeros(), &noise);
        reference.predict(MAX_PREDICT_DT, &Vec3::zeros(), &noise);
        assert_abs_diff_eq!(
            (bank.position() - reference.position()).norm(),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn bias_clamped_on_every_variant() {
        for (mode, model) in [
            (TargetMode::Static, TargetModel::Decoupled),
            (TargetMode::Moving, TargetModel::Coupled),
            (TargetMode::MovingAugmented, TargetModel::Coupled),
        ] {
            let init = InitialState {
                bias: Vec3::new(4.0, -4.0, 0.2),
                ..Default::default()
            };
            let var = InitialVariance {
                pos: 0.5,
                vel: 0.5,
                bias: 1.0,
                acc: 0.1,
            };
            let mut bank = FilterBank::start(mode, model, &init, &var);
            bank.clamp_bias(1.0);
            let b = bank.bias();
            assert_abs_diff_eq!(b.x, 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(b.y, -1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(b.z, 0.2, epsilon = 1e-12);
        }
    }
}
