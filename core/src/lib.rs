//! Core telemetry-to-event pipeline for high-altitude balloon tracking.
//!
//! Samples flow into [`flight::FlightState`], which keeps the bounded flight
//! history, runs the burst detector on every arrival, and re-anchors the
//! predicted landing on the observed burst point once burst is confirmed.
//! Everything here is synchronous; fetching and persistence belong to the
//! driver.

pub mod diagnostics;
pub mod flight;
pub mod interface;
pub mod math;
pub mod prelude;
pub mod processing;

pub use flight::{FlightHandle, FlightState, FlightStateView};
pub use prelude::{DetectorConfig, GeoPoint, TrackerError, TrackerResult};
