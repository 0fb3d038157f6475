pub mod burst;
pub mod corrector;
pub mod history;
pub mod marker;

pub use burst::{BurstDetectionState, BurstDetector, BurstEvent, Detection, DetectionVia, DetectorPhase};
pub use corrector::CorrectedLanding;
pub use history::FlightHistory;
pub use marker::BurstMarker;
