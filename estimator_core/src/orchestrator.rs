//! Fusion orchestrator: the per-tick cycle driven by the external
//! scheduler (nominally 50 Hz).
//!
//! # Processing steps per tick
//! 1. Refresh cached vehicle state (attitude, acceleration, local
//!    position, GPS) and compute the NED acceleration input
//! 2. Reset on measurement timeout or oversized predict gap
//! 3. Predict all active filters to `now`
//! 4. Collect fresh sensor samples per the aid mask, in fixed order
//!    (target GPS, GPS velocity, vision, IRLOCK, UWB), assemble and fuse
//! 5. Initialize from the first valid position observation when the
//!    filter is down
//! 6. Reset on numeric faults; publish pose, state and innovations
//!
//! The estimator is a plain value: single-threaded, non-blocking, no
//! interior mutability. Faults never escape a tick — they surface as
//! validity flags and counters.

use crate::bank::{FilterBank, ObservationFusion, MAX_PREDICT_DT};
use crate::lifecycle::{
    Lifecycle, MEASUREMENT_UPDATED_TIMEOUT, MEASUREMENT_VALID_TIMEOUT, TARGET_POSE_VALID_TIMEOUT,
};
use crate::output::{Diagnostics, EstimatorOutput, EstimatorState, InnovationRecord, TargetPose};
use crate::params::{AidMask, EstimatorParams, TargetMode};
use crate::types::{GateConfig, ProcessNoise, Vec3};
use sensor_models::frames;
use sensor_models::msg::{
    FiducialMarkerReport, IrlockReport, MissionLandingPoint, TargetGnssReport, UwbDistance,
    VehicleAcceleration, VehicleAttitude, VehicleGps, VehicleLocalPosition,
};
use sensor_models::observation::{Assembler, ObsSource, TargetObservation, VehicleContext};
use tracing::{debug, info, warn};

/// Minimum spacing between fused mission-landing pseudo observations.
const MISSION_FUSE_INTERVAL: f64 = 1.0;

/// Init priority when several position sensors are fresh on the same
/// tick: direct relative sensors before GNSS.
const INIT_PRIORITY: [ObsSource; 4] = [
    ObsSource::Vision,
    ObsSource::Irlock,
    ObsSource::Uwb,
    ObsSource::TargetGpsPos,
];

/// Freshest sample of every subscribed topic, polled non-destructively by
/// the caller each tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickInput {
    pub attitude: Option<VehicleAttitude>,
    pub acceleration: Option<VehicleAcceleration>,
    pub local_position: Option<VehicleLocalPosition>,
    pub gps: Option<VehicleGps>,
    pub target_gnss: Option<TargetGnssReport>,
    pub fiducial_marker: Option<FiducialMarkerReport>,
    pub irlock: Option<IrlockReport>,
    pub uwb: Option<UwbDistance>,
    pub mission_landing: Option<MissionLandingPoint>,
}

/// Timestamps of the samples already consumed, so a sample is fused once.
#[derive(Clone, Copy, Debug)]
struct SeenStamps {
    target_gnss: f64,
    gps_vel: f64,
    vision: f64,
    irlock: f64,
    uwb: f64,
}

impl Default for SeenStamps {
    fn default() -> Self {
        Self {
            target_gnss: f64::NEG_INFINITY,
            gps_vel: f64::NEG_INFINITY,
            vision: f64::NEG_INFINITY,
            irlock: f64::NEG_INFINITY,
            uwb: f64::NEG_INFINITY,
        }
    }
}

/// The landing-target position estimator.
pub struct Estimator {
    params: EstimatorParams,
    bank: Option<FilterBank>,
    life: Lifecycle,
    /// Start gating: the owning module activates the estimator during a
    /// landing approach and deactivates it on touchdown.
    active: bool,
    attitude: Option<VehicleAttitude>,
    acceleration: Option<VehicleAcceleration>,
    local_position: Option<VehicleLocalPosition>,
    gps: Option<VehicleGps>,
    seen: SeenStamps,
    last_mission_fuse: f64,
    diag: Diagnostics,
}

impl Estimator {
    pub fn new(params: EstimatorParams) -> Self {
        if params.aid_mask.is_empty() {
            warn!("no sensor fusion enabled; the estimator will never initialize");
        }
        Self {
            params,
            bank: None,
            life: Lifecycle::default(),
            active: true,
            attitude: None,
            acceleration: None,
            local_position: None,
            gps: None,
            seen: SeenStamps::default(),
            last_mission_fuse: f64::NEG_INFINITY,
            diag: Diagnostics::default(),
        }
    }

    pub fn initialized(&self) -> bool {
        self.life.initialized
    }

    pub fn params(&self) -> &EstimatorParams {
        &self.params
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diag
    }

    /// Reload the configuration; structural changes tear the filters down.
    pub fn set_params(&mut self, params: EstimatorParams) {
        if params.mode == TargetMode::MovingAugmented
            && params.model != params.effective_model()
        {
            info!("augmented target mode forces the coupled model");
        }
        if params.structural_change(&self.params) {
            info!("structural parameter change, resetting estimator");
            self.reset();
        }
        self.params = params;
    }

    /// Start/stop gating from the owning module (landing approach begins,
    /// touchdown detected). Deactivation resets.
    pub fn set_active(&mut self, active: bool) {
        if self.active && !active {
            info!("estimator deactivated");
            self.reset();
        }
        self.active = active;
    }

    /// Cold reset: tear down the filters, keep diagnostics counters.
    pub fn reset(&mut self) {
        self.bank = None;
        self.life.reset();
    }

    /// One scheduler tick. `now` is seconds on the same monotonic clock
    /// as the message timestamps.
    pub fn update(&mut self, now: f64, input: &TickInput) -> EstimatorOutput {
        let mut out = EstimatorOutput::default();
        self.refresh_vehicle(input);
        if !self.active {
            return out;
        }

        // Minimal Kalman input: attitude to rotate into NED, acceleration
        // to drive the prediction model.
        let (Some(att), Some(accel)) = (self.attitude, self.acceleration) else {
            if self.life.initialized {
                debug!("kalman input unavailable (attitude or acceleration missing)");
            }
            return out;
        };
        let acc_ned = frames::acceleration_ned(&att.q, &Vec3::from_row_slice(&accel.xyz));

        if self.life.initialized && now - self.life.last_update > self.params.btout {
            warn!(
                elapsed = now - self.life.last_update,
                "measurement timeout, resetting estimator"
            );
            self.diag.timeout_resets += 1;
            self.reset();
        }

        if self.life.initialized {
            let dt = now - self.life.last_predict;
            if dt > MAX_PREDICT_DT {
                warn!(dt, "prediction gap too large, resetting estimator");
                self.reset();
            } else if dt > 0.0 {
                let noise = self.process_noise();
                if let Some(bank) = self.bank.as_mut() {
                    bank.predict(dt, &acc_ned, &noise);
                }
                self.life.last_predict = now;
            }
        }

        let observations = self.collect_observations(now, &att, input);

        // A direct relative sensor alongside a fresh GPS displacement
        // separates the bias from the position: restart once to capture it.
        if self.life.initialized
            && !self.life.bias_set
            && (self.params.aid_mask.contains(AidMask::TARGET_GPS_POS)
                || self.params.aid_mask.contains(AidMask::MISSION_POS))
            && observations
                .iter()
                .any(|o| self.life.bias_capture_pending(now, o))
        {
            info!("second relative position source available, restarting to capture GPS bias");
            self.reset();
        }

        if self.life.initialized {
            self.fuse_all(now, &observations, &mut out);
        } else {
            self.try_initialize(now, &observations);
        }

        if let Some(bank) = self.bank.as_ref() {
            if !bank.is_finite() {
                warn!("non-finite state or covariance, resetting estimator");
                self.diag.nan_resets += 1;
                self.reset();
            }
        }

        if self.life.initialized {
            self.publish(now, &mut out);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Tick internals
    // -----------------------------------------------------------------------

    fn refresh_vehicle(&mut self, input: &TickInput) {
        if input.attitude.is_some() {
            self.attitude = input.attitude;
        }
        if input.acceleration.is_some() {
            self.acceleration = input.acceleration;
        }
        if input.local_position.is_some() {
            self.local_position = input.local_position;
        }
        if input.gps.is_some() {
            self.gps = input.gps;
        }
    }

    fn process_noise(&self) -> ProcessNoise {
        ProcessNoise {
            acc_d_unc: self.params.acc_d_unc,
            acc_t_unc: self.params.acc_t_unc,
            bias_unc: self.params.bias_unc,
        }
    }

    fn gate(&self) -> GateConfig {
        GateConfig {
            reject: self.params.gate_rejection,
            nis_override: self.params.nis_threshold,
        }
    }

    fn fresh(now: f64, timestamp: f64, seen: f64) -> bool {
        timestamp > seen && now - timestamp <= MEASUREMENT_UPDATED_TIMEOUT
    }

    /// Poll, assemble and order the tick's observations.
    fn collect_observations(
        &mut self,
        now: f64,
        att: &VehicleAttitude,
        input: &TickInput,
    ) -> Vec<TargetObservation> {
        let (dist_bottom, dist_bottom_valid) = self
            .local_position
            .map(|lp| (lp.dist_bottom, lp.dist_bottom_valid))
            .unwrap_or((0.0, false));
        let gps_fresh = self
            .gps
            .filter(|g| now - g.timestamp < MEASUREMENT_VALID_TIMEOUT);
        let ctx = VehicleContext {
            q_att: att.q,
            dist_bottom,
            dist_bottom_valid,
            gps: gps_fresh,
        };
        let cfg = self.params.observation_config();
        let assembler = Assembler::new(&cfg, &ctx);
        let mask = self.params.aid_mask;

        let mut observations = Vec::new();

        // Target GPS / mission landing point.
        let target_report = input.target_gnss.filter(|r| {
            mask.contains(AidMask::TARGET_GPS_POS)
                && Self::fresh(now, r.timestamp, self.seen.target_gnss)
        });
        let mission = input
            .mission_landing
            .filter(|m| mask.contains(AidMask::MISSION_POS) && m.valid);
        let use_mission_alone = target_report.is_none()
            && mission.is_some()
            && now - self.last_mission_fuse >= MISSION_FUSE_INTERVAL;
        if target_report.is_some() || use_mission_alone {
            if let Some(obs) = assembler.target_gps(
                target_report.as_ref(),
                mission.as_ref(),
                self.life.bias_set,
            ) {
                if let Some(r) = &target_report {
                    self.seen.target_gnss = r.timestamp;
                }
                if use_mission_alone {
                    self.last_mission_fuse = now;
                }
                // Remember the displacement without the bias rows for the
                // bias hand-off at (re)initialization.
                self.life.note_gps_rel(obs.timestamp, obs.z);
                observations.push(obs);
            }
        }

        // Vehicle GPS velocity: only the augmented model carries separate
        // velocity states to absorb it.
        if mask.contains(AidMask::UAV_GPS_VEL) {
            if let Some(gps) = gps_fresh.filter(|g| {
                g.vel_ned_valid && Self::fresh(now, g.timestamp, self.seen.gps_vel)
            }) {
                self.life
                    .note_gps_vel(gps.timestamp, Vec3::from_row_slice(&gps.vel_ned));
                if self.params.mode == TargetMode::MovingAugmented {
                    if let Some(obs) = assembler.uav_gps_vel() {
                        self.seen.gps_vel = gps.timestamp;
                        observations.push(obs);
                    }
                }
            }
        }

        // Vision.
        if mask.contains(AidMask::VISION_POS) {
            if let Some(marker) = input
                .fiducial_marker
                .filter(|m| Self::fresh(now, m.timestamp, self.seen.vision))
            {
                self.seen.vision = marker.timestamp;
                match assembler.vision(&marker) {
                    Some(obs) => observations.push(obs),
                    None => warn!("vision measurement corrupt, skipped"),
                }
            }
        }

        // IRLOCK.
        if mask.contains(AidMask::IRLOCK_POS) {
            if let Some(report) = input.irlock.filter(|r| {
                r.signal_quality > 0.0 && Self::fresh(now, r.timestamp, self.seen.irlock)
            }) {
                self.seen.irlock = report.timestamp;
                if let Some(obs) = assembler.irlock(&report) {
                    observations.push(obs);
                }
            }
        }

        // UWB.
        if mask.contains(AidMask::UWB_POS) {
            if let Some(report) = input
                .uwb
                .filter(|r| Self::fresh(now, r.timestamp, self.seen.uwb))
            {
                self.seen.uwb = report.timestamp;
                match assembler.uwb(&report) {
                    Some(obs) => observations.push(obs),
                    None => warn!("uwb measurement corrupt, skipped"),
                }
            }
        }

        observations
    }

    fn fuse_all(
        &mut self,
        now: f64,
        observations: &[TargetObservation],
        out: &mut EstimatorOutput,
    ) {
        let gate = self.gate();
        let Some(bank) = self.bank.as_mut() else {
            return;
        };
        for obs in observations {
            let fusion = bank.fuse(obs, &gate);
            bank.clamp_bias(self.params.bias_lim);
            if fusion.fused {
                if obs.source.is_position() {
                    self.life.last_update = now;
                }
            } else {
                self.diag.rejected_observations += 1;
            }
            out.innovations.push(Self::record(now, obs, &fusion));
        }
    }

    fn try_initialize(&mut self, now: f64, observations: &[TargetObservation]) {
        let first = INIT_PRIORITY
            .iter()
            .find_map(|src| observations.iter().find(|o| o.source == *src));
        let Some(obs) = first else {
            return;
        };

        let (init, bias_set) = self.life.initial_state(now, obs, &self.params);
        let var = Lifecycle::initial_variance(&self.params);
        self.bank = Some(FilterBank::start(
            self.params.mode,
            self.params.effective_model(),
            &init,
            &var,
        ));
        self.life.start(now, bias_set);
        info!(
            source = ?obs.source,
            pos = ?init.pos.as_slice(),
            bias = ?init.bias.as_slice(),
            "estimator initialized"
        );
    }

    fn record(
        now: f64,
        obs: &TargetObservation,
        fusion: &ObservationFusion,
    ) -> InnovationRecord {
        let mut rec = InnovationRecord {
            source: obs.source,
            timestamp_sample: obs.timestamp,
            timestamp: now,
            observation: [0.0; 3],
            observation_variance: [0.0; 3],
            innovation: [0.0; 3],
            innovation_variance: [0.0; 3],
            test_ratio: [0.0; 3],
            fusion_enabled: fusion.fusion_enabled,
            fused: [false; 3],
            rejected: [false; 3],
        };
        for i in 0..3 {
            rec.observation[i] = obs.z[i];
            rec.observation_variance[i] = obs.var[i];
            rec.innovation[i] = fusion.axis[i].innovation;
            rec.innovation_variance[i] = fusion.axis[i].innovation_var;
            rec.test_ratio[i] = fusion.axis[i].test_ratio;
            rec.fused[i] = fusion.axis[i].fused;
            rec.rejected[i] = fusion.fusion_enabled[i] && !fusion.axis[i].fused;
        }
        rec
    }

    fn publish(&self, now: f64, out: &mut EstimatorOutput) {
        let Some(bank) = self.bank.as_ref() else {
            return;
        };
        let pos = bank.position();
        let vel = bank.velocity();
        let pos_var = bank.position_var();
        let vel_var = bank.velocity_var();
        let rel_valid = now - self.life.last_update < TARGET_POSE_VALID_TIMEOUT;

        let mut pose = TargetPose {
            timestamp: self.life.last_predict,
            is_static: self.params.mode == TargetMode::Static,
            rel_pos: [pos.x, pos.y, pos.z],
            rel_vel: [vel.x, vel.y, vel.z],
            rel_pos_var: [pos_var.x, pos_var.y, pos_var.z],
            rel_vel_var: [vel_var.x, vel_var.y, vel_var.z],
            rel_pos_valid: rel_valid,
            rel_vel_valid: rel_valid,
            abs_pos: [0.0; 3],
            abs_pos_valid: false,
        };
        if let Some(lp) = self.local_position.filter(|lp| lp.xy_valid) {
            for i in 0..3 {
                pose.abs_pos[i] = pose.rel_pos[i] + lp.xyz[i];
            }
            pose.abs_pos_valid = true;
        }
        out.pose = Some(pose);

        let bias = bank.bias();
        let bias_var = bank.bias_var();
        out.state = Some(EstimatorState {
            timestamp: self.life.last_predict,
            rel_pos: pose.rel_pos,
            rel_vel: pose.rel_vel,
            bias: [bias.x, bias.y, bias.z],
            target_acc: bank.target_acc().map(|a| [a.x, a.y, a.z]),
            target_vel: bank.target_velocity().map(|v| [v.x, v.y, v.z]),
            cov_rel_pos: pose.rel_pos_var,
            cov_rel_vel: pose.rel_vel_var,
            cov_bias: [bias_var.x, bias_var.y, bias_var.z],
            cov_target_acc: bank.target_acc_var().map(|a| [a.x, a.y, a.z]),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::TargetModel;
    use approx::assert_abs_diff_eq;

    fn hover_input(t: f64) -> TickInput {
        TickInput {
            attitude: Some(VehicleAttitude {
                timestamp: t,
                q: [1.0, 0.0, 0.0, 0.0],
            }),
            acceleration: Some(VehicleAcceleration {
                timestamp: t,
                xyz: [0.0, 0.0, -frames::GRAVITY_MSS],
            }),
            local_position: Some(VehicleLocalPosition {
                timestamp: t,
                xy_valid: true,
                xyz: [0.0, 0.0, -5.0],
                dist_bottom: 5.0,
                dist_bottom_valid: true,
            }),
            ..Default::default()
        }
    }

    fn irlock_input(t: f64) -> TickInput {
        TickInput {
            irlock: Some(IrlockReport {
                timestamp: t,
                tan_x: 0.1,
                tan_y: 0.0,
                signal_quality: 1.0,
            }),
            ..hover_input(t)
        }
    }

    fn irlock_params() -> EstimatorParams {
        EstimatorParams {
            aid_mask: AidMask::IRLOCK_POS,
            mode: TargetMode::Static,
            model: TargetModel::Decoupled,
            ..Default::default()
        }
    }

    fn run_ticks(est: &mut Estimator, from: usize, count: usize) -> EstimatorOutput {
        let mut last = EstimatorOutput::default();
        for k in from..from + count {
            let t = 1.0 + k as f64 * 0.02;
            last = est.update(t, &irlock_input(t));
        }
        last
    }

    #[test]
    fn initializes_on_first_position_observation() {
        let mut est = Estimator::new(irlock_params());
        assert!(!est.initialized());
        let t = 1.0;
        est.update(t, &irlock_input(t));
        assert!(est.initialized());
    }

    #[test]
    fn irlock_lock_on_converges() {
        let mut est = Estimator::new(irlock_params());
        let out = run_ticks(&mut est, 0, 50);
        let pose = out.pose.expect("pose published");
        assert!(pose.rel_pos_valid);
        assert_abs_diff_eq!(pose.rel_pos[0], 0.5, epsilon = 0.05);
        assert_abs_diff_eq!(pose.rel_pos[1], 0.0, epsilon = 0.05);
        assert_abs_diff_eq!(pose.rel_pos[2], -5.0, epsilon = 0.05);
        assert!(pose.rel_vel[0].abs() < 0.1);
    }

    #[test]
    fn masked_sensor_never_alters_state() {
        // Same ticks, with and without an (unmasked) vision stream: the
        // published traces must be identical.
        let mut plain = Estimator::new(irlock_params());
        let mut spiked = Estimator::new(irlock_params());
        for k in 0..50 {
            let t = 1.0 + k as f64 * 0.02;
            let a = plain.update(t, &irlock_input(t));
            let mut input = irlock_input(t);
            input.fiducial_marker = Some(FiducialMarkerReport {
                timestamp: t,
                pos: [99.0, 99.0, 99.0],
                cov_diag: None,
            });
            let b = spiked.update(t, &input);
            assert_eq!(
                format!("{:?}", a.pose),
                format!("{:?}", b.pose),
                "masked sensor changed the trace at tick {k}"
            );
            assert_eq!(a.innovations.len(), b.innovations.len());
        }
    }

    #[test]
    fn stale_sample_is_fused_once() {
        let mut est = Estimator::new(irlock_params());
        let t0 = 1.0;
        let out = est.update(t0, &irlock_input(t0));
        assert_eq!(out.innovations.len(), 0); // consumed by initialization

        // Same irlock sample timestamp on the next tick: not re-fused.
        let mut input = hover_input(t0 + 0.02);
        input.irlock = Some(IrlockReport {
            timestamp: t0,
            tan_x: 0.1,
            tan_y: 0.0,
            signal_quality: 1.0,
        });
        let out = est.update(t0 + 0.02, &input);
        assert_eq!(out.innovations.len(), 0);
    }

    #[test]
    fn timeout_resets_and_reinitializes() {
        let mut est = Estimator::new(irlock_params());
        run_ticks(&mut est, 0, 25);
        assert!(est.initialized());
        let t_stop = 1.0 + 25.0 * 0.02;

        // Silence: pose goes invalid after 2 s, filter resets after 3 s.
        let mut saw_invalid = false;
        for k in 0..175 {
            let t = t_stop + k as f64 * 0.02;
            let out = est.update(t, &hover_input(t));
            if let Some(pose) = out.pose {
                if !pose.rel_pos_valid {
                    saw_invalid = true;
                }
            }
        }
        assert!(saw_invalid);
        assert!(!est.initialized());
        assert_eq!(est.diagnostics().timeout_resets, 1);

        // A new observation re-initializes immediately.
        let t = t_stop + 4.0;
        est.update(t, &irlock_input(t));
        assert!(est.initialized());
    }

    #[test]
    fn predict_gap_resets() {
        let mut est = Estimator::new(irlock_params());
        run_ticks(&mut est, 0, 10);
        assert!(est.initialized());
        // Next tick arrives 1.5 s later; timeout (3 s) has not elapsed but
        // the predict gap bound has.
        let t = 1.0 + 9.0 * 0.02 + 1.5;
        est.update(t, &hover_input(t));
        assert!(!est.initialized());
    }

    #[test]
    fn structural_param_change_resets() {
        let mut est = Estimator::new(irlock_params());
        run_ticks(&mut est, 0, 10);
        assert!(est.initialized());
        let mut params = irlock_params();
        params.mode = TargetMode::Moving;
        est.set_params(params);
        assert!(!est.initialized());
        // Re-initializes with the moving-target state on the next sample.
        let t = 2.0;
        let out = est.update(t, &irlock_input(t));
        assert!(est.initialized());
        assert!(out.state.expect("state").target_acc.is_some());
    }

    #[test]
    fn noise_retune_does_not_reset() {
        let mut est = Estimator::new(irlock_params());
        run_ticks(&mut est, 0, 10);
        let mut params = irlock_params();
        params.meas_unc = 0.2;
        est.set_params(params);
        assert!(est.initialized());
    }

    #[test]
    fn nan_acceleration_triggers_numeric_reset() {
        let mut est = Estimator::new(irlock_params());
        run_ticks(&mut est, 0, 10);
        assert!(est.initialized());
        let t = 1.0 + 10.0 * 0.02;
        let mut input = hover_input(t);
        input.acceleration = Some(VehicleAcceleration {
            timestamp: t,
            xyz: [f64::NAN, 0.0, 0.0],
        });
        est.update(t, &input);
        assert!(!est.initialized());
        assert_eq!(est.diagnostics().nan_resets, 1);
    }

    #[test]
    fn gate_rejection_is_reported() {
        let mut est = Estimator::new(EstimatorParams {
            aid_mask: AidMask::VISION_POS,
            mode: TargetMode::Static,
            model: TargetModel::Decoupled,
            ..Default::default()
        });
        let vision = |t: f64, x: f64| TickInput {
            fiducial_marker: Some(FiducialMarkerReport {
                timestamp: t,
                pos: [x, 0.0, 5.0],
                cov_diag: None,
            }),
            ..hover_input(t)
        };
        for k in 0..30 {
            let t = 1.0 + k as f64 * 0.02;
            est.update(t, &vision(t, 2.0));
        }
        let before = est.update(1.0 + 30.0 * 0.02, &hover_input(1.0 + 30.0 * 0.02));
        let pos_before = before.pose.unwrap().rel_pos;

        // 100× outlier: reported with fused = false, state untouched.
        let t = 1.0 + 31.0 * 0.02;
        let out = est.update(t, &vision(t, 60.0));
        let rec = &out.innovations[0];
        assert!(rec.fusion_enabled[0]);
        assert!(!rec.fused[0]);
        assert!(rec.rejected[0]);
        assert!(rec.test_ratio[0] > 1.0);
        let pos_after = out.pose.unwrap().rel_pos;
        assert_abs_diff_eq!(pos_before[0], pos_after[0], epsilon = 0.01);
    }

    #[test]
    fn inactive_estimator_ignores_everything() {
        let mut est = Estimator::new(irlock_params());
        est.set_active(false);
        let out = est.update(1.0, &irlock_input(1.0));
        assert!(!est.initialized());
        assert!(out.pose.is_none());
    }

    #[test]
    fn monotonic_timestamps_between_resets() {
        let mut est = Estimator::new(irlock_params());
        let mut last_predict = f64::NEG_INFINITY;
        for k in 0..60 {
            let t = 1.0 + k as f64 * 0.02;
            est.update(t, &irlock_input(t));
            if est.initialized() {
                assert!(est.life.last_predict >= last_predict);
                last_predict = est.life.last_predict;
            }
        }
    }
}
