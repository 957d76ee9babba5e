//! Shared types of the filter bank.

use nalgebra::Vector3;

pub type Vec3 = Vector3<f64>;

/// Process-noise intensities handed to every predict step.
#[derive(Clone, Copy, Debug)]
pub struct ProcessNoise {
    /// Vehicle acceleration variance (input noise, m²/s⁴).
    pub acc_d_unc: f64,
    /// Target acceleration random-walk intensity (moving variants).
    pub acc_t_unc: f64,
    /// GPS bias random-walk intensity.
    pub bias_unc: f64,
}

/// Initial state mean at filter start. `vel` is the relative velocity for
/// non-augmented variants and the vehicle velocity for the augmented one.
#[derive(Clone, Copy, Debug, Default)]
pub struct InitialState {
    pub pos: Vec3,
    pub vel: Vec3,
    pub bias: Vec3,
    pub target_acc: Vec3,
    pub target_vel: Vec3,
}

/// Initial variance per sub-state, applied per axis.
#[derive(Clone, Copy, Debug)]
pub struct InitialVariance {
    pub pos: f64,
    pub vel: f64,
    pub bias: f64,
    pub acc: f64,
}

/// Gate configuration for one fusion call.
#[derive(Clone, Copy, Debug)]
pub struct GateConfig {
    /// Apply rejection (the test ratio is reported regardless).
    pub reject: bool,
    /// Scalar override of the per-dof χ² threshold.
    pub nis_override: Option<f64>,
}

/// Outcome of one scalar (per-axis) update.
#[derive(Clone, Copy, Debug, Default)]
pub struct AxisFusion {
    pub innovation: f64,
    pub innovation_var: f64,
    pub test_ratio: f64,
    pub fused: bool,
}
