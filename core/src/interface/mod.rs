pub mod prediction;
pub mod sample;

pub use prediction::{Prediction, PredictionMetrics, PredictionPoint};
pub use sample::{PositionSample, StationReport};
