use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::diagnostics::LogManager;
use crate::flight::view::FlightStateView;
use crate::interface::{PositionSample, Prediction};
use crate::prelude::{DetectorConfig, TrackerError, TrackerResult, DEFAULT_HISTORY_LIMIT};
use crate::processing::corrector::{self, CorrectedLanding};
use crate::processing::{
    BurstDetectionState, BurstDetector, BurstEvent, Detection, DetectorPhase, FlightHistory,
};

const LOG: LogManager = LogManager::new("habcore::flight");

/// Authoritative state of one balloon flight.
///
/// All mutation goes through [`append`](Self::append),
/// [`set_prediction`](Self::set_prediction) and [`reset`](Self::reset);
/// readers work from [`snapshot`](Self::snapshot) copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightState {
    history: FlightHistory,
    current: Option<PositionSample>,
    detector: BurstDetector,
    burst_event: Option<BurstEvent>,
    corrected_landing: Option<CorrectedLanding>,
    prediction: Option<Prediction>,
}

impl FlightState {
    pub fn new(config: DetectorConfig, history_limit: usize) -> Self {
        Self {
            history: FlightHistory::with_capacity(history_limit),
            current: None,
            detector: BurstDetector::new(config),
            burst_event: None,
            corrected_landing: None,
            prediction: None,
        }
    }

    /// Ingests one validated sample and runs burst detection on it.
    ///
    /// Samples with unusable coordinates are rejected before anything changes.
    pub fn append(&mut self, sample: PositionSample) -> TrackerResult<Detection> {
        sample.validate()?;

        let evicted = self.history.push(sample.clone());
        if evicted > 0 {
            LOG.detail(&format!("evicted {evicted} samples from flight history"));
        }

        let detection = self.detector.evaluate(&sample);
        self.current = Some(sample);

        if let Detection::Confirmed { event, .. } = &detection {
            self.burst_event = Some(event.clone());
            self.recompute_landing();
        }
        Ok(detection)
    }

    /// Replaces the active prediction and refreshes its cached metrics.
    ///
    /// A burst that was already confirmed is re-anchored straight away.
    pub fn set_prediction(&mut self, mut prediction: Prediction) -> TrackerResult<()> {
        let endpoints = prediction
            .burst_point
            .iter()
            .chain(prediction.landing_point.iter());
        for point in endpoints {
            if !point.position().is_valid() {
                return Err(TrackerError::InvalidPrediction(format!(
                    "point out of range: ({}, {})",
                    point.latitude, point.longitude
                )));
            }
        }

        prediction.metrics = None;
        if let Some(metrics) = prediction.refresh_metrics() {
            LOG.record(&format!(
                "prediction metrics: {:.2} km at {:.1} deg",
                metrics.distance, metrics.bearing
            ));
        } else {
            LOG.warn("prediction lacks a burst or landing point; no drift leg available");
        }
        self.prediction = Some(prediction);

        if self.burst_event.is_some() {
            self.recompute_landing();
        }
        Ok(())
    }

    /// Drops the active prediction. Any corrected landing already computed stays.
    pub fn clear_prediction(&mut self) {
        self.prediction = None;
    }

    /// Returns the flight to its initial empty state, keeping configured thresholds.
    pub fn reset(&mut self) {
        *self = Self::new(*self.detector.config(), self.history.max_len());
        LOG.record("flight state reset");
    }

    /// New thresholds apply from the next sample onward.
    pub fn set_detector_config(&mut self, config: DetectorConfig) {
        self.detector.set_config(config);
    }

    pub fn set_history_limit(&mut self, limit: usize) {
        let evicted = self.history.set_max_len(limit);
        if evicted > 0 {
            LOG.detail(&format!("history re-capped at {limit}, evicted {evicted}"));
        }
    }

    fn recompute_landing(&mut self) {
        let (Some(prediction), Some(burst)) = (&self.prediction, &self.burst_event) else {
            return;
        };
        if let Some(landing) = corrector::recompute(prediction, burst, Utc::now()) {
            LOG.record(&format!(
                "corrected landing: {:.6}, {:.6}",
                landing.latitude, landing.longitude
            ));
            self.corrected_landing = Some(landing);
        }
    }

    pub fn current(&self) -> Option<&PositionSample> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &FlightHistory {
        &self.history
    }

    pub fn burst_event(&self) -> Option<&BurstEvent> {
        self.burst_event.as_ref()
    }

    pub fn corrected_landing(&self) -> Option<&CorrectedLanding> {
        self.corrected_landing.as_ref()
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        self.prediction.as_ref()
    }

    pub fn detector_config(&self) -> DetectorConfig {
        *self.detector.config()
    }

    pub fn detection_state(&self) -> BurstDetectionState {
        self.detector.state()
    }

    pub fn phase(&self) -> DetectorPhase {
        self.detector.phase()
    }

    pub fn snapshot(&self) -> FlightStateView {
        FlightStateView {
            current: self.current.clone(),
            history: self.history.to_vec(),
            history_limit: self.history.max_len(),
            burst_detected: self.burst_event.is_some(),
            burst_event: self.burst_event.clone(),
            corrected_landing: self.corrected_landing.clone(),
            prediction: self.prediction.clone(),
            detection: self.detector.state(),
            phase: self.detector.phase(),
        }
    }
}

impl Default for FlightState {
    fn default() -> Self {
        Self::new(DetectorConfig::default(), DEFAULT_HISTORY_LIMIT)
    }
}
