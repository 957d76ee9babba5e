//! `sensor_models` — Sensor boundary data model for the landing-target
//! estimator.
//!
//! # Module layout
//! - [`msg`]         — Subscribed message structs (the data-flow boundary)
//! - [`frames`]      — Mount rotations, body→NED, flat-earth GNSS projection
//! - [`observation`] — Canonical observation form and the per-sensor assembler

pub mod frames;
pub mod msg;
pub mod observation;

pub use observation::{
    Assembler, ObsSource, ObservationConfig, TargetObservation, VehicleContext,
};
