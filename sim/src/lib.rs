//! `sim` — Deterministic landing-approach simulator.
//!
//! # Module layout
//! - [`target`]    — Ground-truth target motion
//! - [`scenarios`] — Named, seeded scenario definitions
//! - [`sim`]       — The simulator driving the estimator tick by tick

pub mod scenarios;
pub mod sim;
pub mod target;

pub use scenarios::{Scenario, ScenarioKind};
pub use sim::{LandingSim, SimReport};
