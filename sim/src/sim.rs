//! Landing-approach simulator: steps the ground truth, synthesizes sensor
//! messages at their configured rates and drives the estimator at the
//! scheduler tick rate.
//!
//! The vehicle hovers level at the scenario altitude; all randomness
//! comes from one seeded generator, so a run is reproducible.

use crate::scenarios::Scenario;
use estimator_core::orchestrator::{Estimator, TickInput};
use estimator_core::output::{
    Diagnostics, EstimatorOutput, EstimatorState, InnovationRecord, TargetPose,
};
use nalgebra::Vector3;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sensor_models::frames::{self, GRAVITY_MSS};
use sensor_models::msg::{
    FiducialMarkerReport, IrlockReport, TargetGnssReport, UwbDistance, VehicleAcceleration,
    VehicleAttitude, VehicleGps, VehicleLocalPosition,
};

/// Reference home position of the simulated flight.
const BASE_LAT_DEG: f64 = 47.397742;
const BASE_LON_DEG: f64 = 8.545594;
const BASE_ALT_M: f64 = 488.0;

/// Everything a finished run exposes for evaluation.
#[derive(Clone, Debug, Default)]
pub struct SimReport {
    pub name: String,
    /// Published poses, in tick order.
    pub poses: Vec<TargetPose>,
    /// Last published internal state (bias, target acceleration, …).
    pub final_state: Option<EstimatorState>,
    pub innovations: Vec<InnovationRecord>,
    pub diagnostics: Diagnostics,
    /// Ground-truth relative position/velocity at the end of the run.
    pub truth_rel_pos: [f64; 3],
    pub truth_rel_vel: [f64; 3],
    pub initialized_at_end: bool,
}

impl SimReport {
    pub fn final_pose(&self) -> Option<&TargetPose> {
        self.poses.last()
    }
}

/// One simulated landing approach.
pub struct LandingSim {
    scenario: Scenario,
    pub estimator: Estimator,
    rng: ChaCha8Rng,
    next_irlock: f64,
    next_vision: f64,
    next_gps: f64,
    next_uwb: f64,
    outlier_pending: bool,
    mode_switched: bool,
}

impl LandingSim {
    pub fn new(scenario: Scenario) -> Self {
        let estimator = Estimator::new(scenario.params.clone());
        let rng = ChaCha8Rng::seed_from_u64(scenario.seed);
        let outlier_pending = scenario
            .sensors
            .vision
            .and_then(|v| v.outlier_at)
            .is_some();
        Self {
            estimator,
            rng,
            next_irlock: 0.0,
            next_vision: 0.0,
            next_gps: 0.0,
            next_uwb: 0.0,
            outlier_pending,
            mode_switched: false,
            scenario,
        }
    }

    /// Run the whole scenario and collect the report.
    pub fn run(&mut self) -> SimReport {
        let mut report = SimReport {
            name: self.scenario.name.clone(),
            ..Default::default()
        };
        let ticks = (self.scenario.duration / self.scenario.tick_dt).round() as u64;
        for k in 1..=ticks {
            let t = k as f64 * self.scenario.tick_dt;
            let out = self.step(t);
            if let Some(pose) = out.pose {
                report.poses.push(pose);
            }
            if out.state.is_some() {
                report.final_state = out.state;
            }
            report.innovations.extend(out.innovations);
        }
        let t_end = ticks as f64 * self.scenario.tick_dt;
        let truth = self.scenario.target.position(t_end);
        report.truth_rel_pos = [truth.x, truth.y, truth.z];
        let vel = self.scenario.target.velocity();
        report.truth_rel_vel = [vel.x, vel.y, vel.z];
        report.diagnostics = self.estimator.diagnostics();
        report.initialized_at_end = self.estimator.initialized();
        report
    }

    /// One scheduler tick at simulation time `t`.
    pub fn step(&mut self, t: f64) -> EstimatorOutput {
        if let Some((at, mode)) = self.scenario.mode_switch {
            if !self.mode_switched && t >= at {
                let mut params = self.estimator.params().clone();
                params.mode = mode;
                self.estimator.set_params(params);
                self.mode_switched = true;
            }
        }

        let input = self.build_input(t);
        self.estimator.update(t, &input)
    }

    fn build_input(&mut self, t: f64) -> TickInput {
        let alt = self.scenario.vehicle_alt;
        let mut input = TickInput {
            attitude: Some(VehicleAttitude {
                timestamp: t,
                q: [1.0, 0.0, 0.0, 0.0],
            }),
            acceleration: Some(VehicleAcceleration {
                timestamp: t,
                xyz: [0.0, 0.0, -GRAVITY_MSS],
            }),
            local_position: Some(VehicleLocalPosition {
                timestamp: t,
                xy_valid: true,
                xyz: [0.0, 0.0, -alt],
                dist_bottom: alt,
                dist_bottom_valid: true,
            }),
            gps: Some(VehicleGps {
                timestamp: t,
                lat_deg: BASE_LAT_DEG,
                lon_deg: BASE_LON_DEG,
                alt_m: BASE_ALT_M,
                vel_ned: [0.0; 3],
                vel_ned_valid: true,
            }),
            ..Default::default()
        };

        let silenced = self
            .scenario
            .dropout
            .map(|(start, end)| t >= start && t < end)
            .unwrap_or(false);
        if silenced {
            return input;
        }

        let rel = self.scenario.target.position(t);

        if let Some(rate) = self.scenario.sensors.irlock_rate_hz {
            if t >= self.next_irlock {
                self.next_irlock = t + 1.0 / rate;
                input.irlock = Some(IrlockReport {
                    timestamp: t,
                    tan_x: rel.x / alt,
                    tan_y: rel.y / alt,
                    signal_quality: 1.0,
                });
            }
        }

        if let Some(cfg) = self.scenario.sensors.vision {
            if t >= self.next_vision {
                self.next_vision = t + 1.0 / cfg.rate_hz;
                let mut pos = rel + self.uniform3(cfg.noise);
                if self.outlier_pending && cfg.outlier_at.is_some_and(|at| t >= at) {
                    self.outlier_pending = false;
                    pos.x += 100.0 * cfg.noise;
                }
                input.fiducial_marker = Some(FiducialMarkerReport {
                    timestamp: t,
                    pos: [pos.x, pos.y, pos.z],
                    cov_diag: None,
                });
            }
        }

        if let Some(rate) = self.scenario.sensors.uwb_rate_hz {
            if t >= self.next_uwb {
                self.next_uwb = t + 1.0 / rate;
                input.uwb = Some(UwbDistance {
                    timestamp: t,
                    position: [rel.x, rel.y, rel.z],
                    grid_yaw_rad: 0.0,
                });
            }
        }

        if let Some(cfg) = self.scenario.sensors.target_gps {
            if t >= self.next_gps {
                self.next_gps = t + 1.0 / cfg.rate_hz;
                let reported = rel + Vector3::from_row_slice(&cfg.bias);
                let (lat, lon, alt_m) =
                    frames::offset_gps(BASE_LAT_DEG, BASE_LON_DEG, BASE_ALT_M, &reported);
                input.target_gnss = Some(TargetGnssReport {
                    timestamp: t,
                    lat_deg: lat,
                    lon_deg: lon,
                    alt_m,
                    vel_ned: [0.0; 3],
                    vel_ned_valid: false,
                });
            }
        }

        input
    }

    /// Uniform noise in [−bound, bound] per axis.
    fn uniform3(&mut self, bound: f64) -> Vector3<f64> {
        Vector3::from_fn(|_, _| self.rng.gen::<f64>() * 2.0 * bound - bound)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
