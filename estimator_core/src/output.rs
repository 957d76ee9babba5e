//! Published estimator outputs. These are plain copies of internal state;
//! the message bus that carries them lives outside the workspace.

use sensor_models::observation::ObsSource;
use serde::{Deserialize, Serialize};

/// Aggregated target pose for the landing controller.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct TargetPose {
    pub timestamp: f64,
    pub is_static: bool,
    /// Relative position of the target w.r.t. the vehicle, NED (m).
    pub rel_pos: [f64; 3],
    /// Relative velocity, NED (m/s).
    pub rel_vel: [f64; 3],
    pub rel_pos_var: [f64; 3],
    pub rel_vel_var: [f64; 3],
    pub rel_pos_valid: bool,
    pub rel_vel_valid: bool,
    /// Absolute NED position (vehicle local position + relative), when
    /// the local position is valid.
    pub abs_pos: [f64; 3],
    pub abs_pos_valid: bool,
}

/// Full internal state with covariance diagonal, for logging/telemetry.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct EstimatorState {
    pub timestamp: f64,
    pub rel_pos: [f64; 3],
    pub rel_vel: [f64; 3],
    pub bias: [f64; 3],
    pub target_acc: Option<[f64; 3]>,
    pub target_vel: Option<[f64; 3]>,
    pub cov_rel_pos: [f64; 3],
    pub cov_rel_vel: [f64; 3],
    pub cov_bias: [f64; 3],
    pub cov_target_acc: Option<[f64; 3]>,
}

/// Per-sensor innovation record for one processed observation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct InnovationRecord {
    pub source: ObsSource,
    /// Sample time of the observation.
    pub timestamp_sample: f64,
    /// Tick time at which it was processed.
    pub timestamp: f64,
    pub observation: [f64; 3],
    pub observation_variance: [f64; 3],
    pub innovation: [f64; 3],
    pub innovation_variance: [f64; 3],
    /// Mahalanobis d² over the gate threshold; > 1 is inconsistent.
    pub test_ratio: [f64; 3],
    pub fusion_enabled: [bool; 3],
    pub fused: [bool; 3],
    pub rejected: [bool; 3],
}

/// Fault counters surfaced through telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub nan_resets: u32,
    pub timeout_resets: u32,
    pub rejected_observations: u32,
}

/// Everything one tick publishes.
#[derive(Clone, Debug, Default)]
pub struct EstimatorOutput {
    pub pose: Option<TargetPose>,
    pub state: Option<EstimatorState>,
    pub innovations: Vec<InnovationRecord>,
}
