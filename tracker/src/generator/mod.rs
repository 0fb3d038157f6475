pub mod profile;
pub mod replay;
pub mod template;

pub use profile::{FlightProfileConfig, GeneratedFlight};
pub use replay::ReplaySource;
