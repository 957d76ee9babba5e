//! `estimator_core` — Landing-target position estimator core.
//!
//! Fuses target GPS, vehicle GPS velocity, vision, IRLOCK and UWB
//! observations into a relative position/velocity/bias estimate of a
//! landing target, via a bank of linear-Gaussian filters.
//!
//! # Module layout
//! - [`types`]        — Shared vectors, process noise, init structs
//! - [`params`]       — Configuration (modes, models, aid mask, noise)
//! - [`gating`]       — Mahalanobis gating (χ² per observation dof)
//! - [`decoupled`]    — Per-axis filters (static 3-state, moving 4-state)
//! - [`coupled`]      — Coupled filters (9/12/15-state)
//! - [`bank`]         — Variant selection behind one predict/fuse interface
//! - [`lifecycle`]    — Start, reset, bias hand-off, timeouts
//! - [`orchestrator`] — The per-tick fusion loop
//! - [`output`]       — Published pose, state, innovation records

pub mod bank;
pub mod coupled;
pub mod decoupled;
pub mod gating;
pub mod lifecycle;
pub mod orchestrator;
pub mod output;
pub mod params;
pub mod types;

pub use orchestrator::{Estimator, TickInput};
pub use output::{Diagnostics, EstimatorOutput, EstimatorState, InnovationRecord, TargetPose};
pub use params::{AidMask, EstimatorParams, TargetMode, TargetModel};
