use crate::generator::profile::GeneratedFlight;
use crate::source::TelemetrySource;
use crate::workflow::config::normalize_callsign;
use async_trait::async_trait;
use habcore::interface::{PositionSample, StationReport};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Plays a generated flight back one sample per fetch; chasers stay parked.
pub struct ReplaySource {
    balloon: String,
    pending: Mutex<VecDeque<PositionSample>>,
    chasers: HashMap<String, StationReport>,
}

impl ReplaySource {
    pub fn new(flight: &GeneratedFlight) -> Self {
        Self {
            balloon: normalize_callsign(&flight.callsign),
            pending: Mutex::new(flight.samples.iter().cloned().collect()),
            chasers: HashMap::new(),
        }
    }

    pub fn with_chaser(mut self, report: StationReport) -> Self {
        self.chasers
            .insert(normalize_callsign(&report.callsign), report);
        self
    }

    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl TelemetrySource for ReplaySource {
    async fn fetch_station(&self, callsign: &str) -> anyhow::Result<Option<StationReport>> {
        let callsign = normalize_callsign(callsign);
        if callsign == self.balloon {
            let next = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            return Ok(next.map(|sample| StationReport::new(callsign, sample)));
        }
        Ok(self.chasers.get(&callsign).cloned())
    }
}
