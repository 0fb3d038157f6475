use serde::{Deserialize, Serialize};

use crate::interface::{PositionSample, Prediction};
use crate::processing::{BurstDetectionState, BurstEvent, CorrectedLanding, DetectorPhase};

/// Read-only copy of a [`FlightState`](crate::flight::FlightState) taken under a single lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightStateView {
    pub current: Option<PositionSample>,
    pub history: Vec<PositionSample>,
    pub history_limit: usize,
    pub burst_detected: bool,
    pub burst_event: Option<BurstEvent>,
    pub corrected_landing: Option<CorrectedLanding>,
    /// Includes the cached burst-to-landing metrics.
    pub prediction: Option<Prediction>,
    pub detection: BurstDetectionState,
    pub phase: DetectorPhase,
}
