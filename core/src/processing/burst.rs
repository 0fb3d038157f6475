//! Burst detection state machine.
//!
//! Each sample is checked for an explicit burst marker first; only when none
//! is present does the altitude-trend rule run. Once burst is confirmed the
//! detector ignores every further sample until it is reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnostics::LogManager;
use crate::interface::PositionSample;
use crate::prelude::DetectorConfig;
use crate::processing::marker::BurstMarker;

const LOG: LogManager = LogManager::new("habcore::burst");

/// Which rule confirmed the burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionVia {
    Marker,
    Trend,
}

/// The observed burst, recorded once per flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstEvent {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters.
    pub altitude: f64,
    pub timestamp: DateTime<Utc>,
    pub peak_altitude: f64,
    pub altitude_drop: f64,
    pub via: DetectionVia,
}

/// Outcome of feeding one sample to the detector.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    None,
    Confirmed { via: DetectionVia, event: BurstEvent },
}

impl Detection {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Detection::Confirmed { .. })
    }

    pub fn event(&self) -> Option<&BurstEvent> {
        match self {
            Detection::Confirmed { event, .. } => Some(event),
            Detection::None => None,
        }
    }
}

/// Coarse phase of the altitude-trend rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorPhase {
    Idle,
    Monitoring,
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstDetectionState {
    pub monitoring: bool,
    pub peak_altitude: f64,
    pub consecutive_descent_count: u32,
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstDetector {
    config: DetectorConfig,
    state: BurstDetectionState,
    /// Altitude of the last non-marker sample; `None` after a sample without one.
    previous_altitude: Option<f64>,
}

impl BurstDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: BurstDetectionState::default(),
            previous_altitude: None,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Swaps thresholds without discarding the accumulated trend state.
    pub fn set_config(&mut self, config: DetectorConfig) {
        self.config = config;
    }

    pub fn state(&self) -> BurstDetectionState {
        self.state
    }

    pub fn phase(&self) -> DetectorPhase {
        if self.state.confirmed {
            DetectorPhase::Confirmed
        } else if self.state.monitoring {
            DetectorPhase::Monitoring
        } else {
            DetectorPhase::Idle
        }
    }

    pub fn reset(&mut self) {
        self.state = BurstDetectionState::default();
        self.previous_altitude = None;
    }

    pub fn evaluate(&mut self, sample: &PositionSample) -> Detection {
        if self.state.confirmed {
            return Detection::None;
        }

        if let Some(marker) = sample.comment.as_deref().and_then(BurstMarker::parse) {
            return self.confirm_from_marker(marker, sample.timestamp);
        }

        let detection = match sample.altitude {
            Some(altitude) => self.evaluate_trend(altitude, sample),
            None => Detection::None,
        };
        self.previous_altitude = sample.altitude;
        detection
    }

    fn confirm_from_marker(&mut self, marker: BurstMarker, timestamp: DateTime<Utc>) -> Detection {
        let peak_altitude = if self.state.monitoring {
            self.state.peak_altitude.max(marker.altitude)
        } else {
            marker.altitude
        };
        self.state.confirmed = true;
        self.state.peak_altitude = peak_altitude;

        let event = BurstEvent {
            latitude: marker.latitude,
            longitude: marker.longitude,
            altitude: marker.altitude,
            timestamp,
            peak_altitude,
            altitude_drop: peak_altitude - marker.altitude,
            via: DetectionVia::Marker,
        };
        LOG.record(&format!(
            "burst marker received: {:.1} m at {:.6}, {:.6}",
            event.altitude, event.latitude, event.longitude
        ));
        Detection::Confirmed {
            via: DetectionVia::Marker,
            event,
        }
    }

    fn evaluate_trend(&mut self, altitude: f64, sample: &PositionSample) -> Detection {
        let state = &mut self.state;

        if !state.monitoring {
            if altitude >= self.config.min_altitude_to_start {
                state.monitoring = true;
                state.peak_altitude = altitude;
                LOG.record(&format!("burst monitoring activated at {altitude:.1} m"));
            }
            return Detection::None;
        }

        if altitude > state.peak_altitude {
            state.peak_altitude = altitude;
            state.consecutive_descent_count = 0;
            LOG.detail(&format!("new peak altitude {altitude:.1} m"));
        }

        let altitude_drop = state.peak_altitude - altitude;
        if altitude_drop >= self.config.significant_drop {
            match self.previous_altitude {
                Some(previous) if altitude < previous => {
                    state.consecutive_descent_count += 1;
                    LOG.detail(&format!(
                        "descent at {altitude:.1} m (drop {altitude_drop:.1} m, consecutive {})",
                        state.consecutive_descent_count
                    ));
                }
                _ => state.consecutive_descent_count = 0,
            }
        } else {
            state.consecutive_descent_count = 0;
        }

        if state.consecutive_descent_count < self.config.required_descent_points.max(1) {
            return Detection::None;
        }

        state.confirmed = true;
        let event = BurstEvent {
            latitude: sample.latitude,
            longitude: sample.longitude,
            altitude,
            timestamp: sample.timestamp,
            peak_altitude: state.peak_altitude,
            altitude_drop,
            via: DetectionVia::Trend,
        };
        LOG.record(&format!(
            "burst confirmed at {:.1} m (peak {:.1} m, drop {:.1} m) near {:.6}, {:.6}",
            event.altitude, event.peak_altitude, event.altitude_drop, event.latitude, event.longitude
        ));
        Detection::Confirmed {
            via: DetectionVia::Trend,
            event,
        }
    }
}

impl Default for BurstDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
