use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::interface::PositionSample;
use crate::prelude::DEFAULT_HISTORY_LIMIT;

/// Arrival-ordered sample history that evicts its oldest entries past a fixed cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightHistory {
    samples: VecDeque<PositionSample>,
    max_len: usize,
}

impl FlightHistory {
    /// A cap of zero is raised to one so the current sample is always retained.
    pub fn with_capacity(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            samples: VecDeque::with_capacity(max_len.min(DEFAULT_HISTORY_LIMIT)),
            max_len,
        }
    }

    /// Appends a sample, returning how many old samples were evicted.
    pub fn push(&mut self, sample: PositionSample) -> usize {
        self.samples.push_back(sample);
        self.evict_overflow()
    }

    /// Changes the cap, evicting the oldest samples if the history is now too long.
    pub fn set_max_len(&mut self, max_len: usize) -> usize {
        self.max_len = max_len.max(1);
        self.evict_overflow()
    }

    fn evict_overflow(&mut self) -> usize {
        let excess = self.samples.len().saturating_sub(self.max_len);
        self.samples.drain(..excess);
        excess
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn latest(&self) -> Option<&PositionSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionSample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<PositionSample> {
        self.samples.iter().cloned().collect()
    }
}

impl Default for FlightHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_LIMIT)
    }
}
