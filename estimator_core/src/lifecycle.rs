//! Filter life cycle: start, cold reset, and the bookkeeping that seeds
//! the initial state — including the GPS bias hand-off between GNSS and
//! the direct relative-position sensors.

use crate::params::{EstimatorParams, TargetMode};
use crate::types::{InitialState, InitialVariance, Vec3};
use sensor_models::observation::{ObsSource, TargetObservation};

/// A sample older than this (against `now`) no longer counts as a fresh
/// bus update.
pub const MEASUREMENT_UPDATED_TIMEOUT: f64 = 0.1;

/// Window within which remembered measurements (GPS displacement, GPS
/// velocity) may still seed initialization.
pub const MEASUREMENT_VALID_TIMEOUT: f64 = 1.0;

/// The published relative position stays valid this long after the last
/// accepted position update.
pub const TARGET_POSE_VALID_TIMEOUT: f64 = 2.0;

/// Life-cycle state owned by the orchestrator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lifecycle {
    pub initialized: bool,
    /// GNSS observations carry bias rows only once this is set.
    pub bias_set: bool,
    pub last_predict: f64,
    pub last_update: f64,
    /// Freshest GPS-derived displacement, kept to seed the bias.
    gps_rel: Option<(f64, Vec3)>,
    /// Freshest vehicle GPS velocity, kept to seed the augmented state.
    gps_vel: Option<(f64, Vec3)>,
}

impl Lifecycle {
    /// Cold reset, idempotent. The remembered GPS measurements survive:
    /// they are sensor memory, not filter state, and seed the bias when
    /// the filter restarts within their freshness window.
    pub fn reset(&mut self) {
        self.initialized = false;
        self.bias_set = false;
        self.last_predict = 0.0;
        self.last_update = 0.0;
    }

    pub fn note_gps_rel(&mut self, timestamp: f64, xyz: Vec3) {
        self.gps_rel = Some((timestamp, xyz));
    }

    pub fn note_gps_vel(&mut self, timestamp: f64, vel: Vec3) {
        self.gps_vel = Some((timestamp, vel));
    }

    pub fn fresh_gps_rel(&self, now: f64) -> Option<Vec3> {
        self.gps_rel
            .filter(|(ts, _)| now - ts < MEASUREMENT_VALID_TIMEOUT)
            .map(|(_, v)| v)
    }

    pub fn fresh_gps_vel(&self, now: f64) -> Option<Vec3> {
        self.gps_vel
            .filter(|(ts, _)| now - ts < MEASUREMENT_VALID_TIMEOUT)
            .map(|(_, v)| v)
    }

    /// True once a non-GNSS position sensor can pin the true relative
    /// position while a fresh GPS displacement exists: the difference is
    /// the bias, and the filter restarts once to capture it.
    pub fn bias_capture_pending(&self, now: f64, obs: &TargetObservation) -> bool {
        !self.bias_set
            && obs.source.is_position()
            && obs.source != ObsSource::TargetGpsPos
            && self.fresh_gps_rel(now).is_some()
    }

    /// Build the initial state from the first accepted observation.
    /// Returns the state and whether the bias was seeded.
    pub fn initial_state(
        &self,
        now: f64,
        obs: &TargetObservation,
        params: &EstimatorParams,
    ) -> (InitialState, bool) {
        let mut init = InitialState {
            pos: obs.z,
            ..Default::default()
        };

        // GNSS fixes carry a bias the direct sensors don't: seed it with
        // the displacement disagreement beyond the initial position
        // uncertainty, projected inside the clamp.
        let mut bias_set = false;
        if obs.source != ObsSource::TargetGpsPos {
            if let Some(gps_rel) = self.fresh_gps_rel(now) {
                let pos_sigma = params.pos_unc_in.sqrt();
                let d = gps_rel - init.pos;
                init.bias = Vec3::from_fn(|i, _| {
                    let excess = (d[i].abs() - pos_sigma).max(0.0);
                    (excess * d[i].signum()).clamp(-params.bias_lim, params.bias_lim)
                });
                bias_set = true;
            }
        }

        // The augmented model estimates the vehicle velocity directly;
        // everything else starts the velocity at zero.
        if params.mode == TargetMode::MovingAugmented {
            if let Some(vel) = self.fresh_gps_vel(now) {
                init.vel = vel;
            }
        }

        (init, bias_set)
    }

    pub fn initial_variance(params: &EstimatorParams) -> InitialVariance {
        InitialVariance {
            pos: params.pos_unc_in,
            vel: params.vel_unc_in,
            bias: params.bias_unc_in,
            acc: params.acc_unc_in,
        }
    }

    /// Mark the filter started at `now`.
    pub fn start(&mut self, now: f64, bias_set: bool) {
        self.initialized = true;
        self.bias_set = bias_set;
        self.last_predict = now;
        self.last_update = now;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
