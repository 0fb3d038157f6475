use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::flight::state::FlightState;
use crate::flight::view::FlightStateView;
use crate::interface::{PositionSample, Prediction};
use crate::prelude::{DetectorConfig, TrackerResult};
use crate::processing::Detection;

/// Shared owner of a [`FlightState`].
///
/// Writers take the lock for one whole operation, so readers always see either
/// the state before it or after it. Snapshots are value copies.
#[derive(Clone, Default)]
pub struct FlightHandle {
    inner: Arc<RwLock<FlightState>>,
}

impl FlightHandle {
    pub fn new(state: FlightState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FlightState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FlightState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, sample: PositionSample) -> TrackerResult<Detection> {
        self.write().append(sample)
    }

    pub fn set_prediction(&self, prediction: Prediction) -> TrackerResult<()> {
        self.write().set_prediction(prediction)
    }

    pub fn clear_prediction(&self) {
        self.write().clear_prediction();
    }

    pub fn reset(&self) {
        self.write().reset();
    }

    pub fn set_detector_config(&self, config: DetectorConfig) {
        self.write().set_detector_config(config);
    }

    pub fn set_history_limit(&self, limit: usize) {
        self.write().set_history_limit(limit);
    }

    /// Replaces the whole state, e.g. with one restored from disk.
    pub fn restore(&self, state: FlightState) {
        *self.write() = state;
    }

    pub fn snapshot(&self) -> FlightStateView {
        self.read().snapshot()
    }

    /// Full copy of the aggregate, detector internals included, for persistence.
    pub fn export(&self) -> FlightState {
        self.read().clone()
    }

    /// Runs `f` against the state under a read lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&FlightState) -> R) -> R {
        f(&self.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::thread;

    fn sample(idx: i64, altitude: f64) -> PositionSample {
        PositionSample::new(35.0, -86.0, Utc.timestamp_opt(idx, 0).unwrap()).with_altitude(altitude)
    }

    #[test]
    fn readers_never_see_torn_state() {
        let handle = FlightHandle::default();
        let writer = {
            let handle = handle.clone();
            thread::spawn(move || {
                for idx in 0..500 {
                    handle.append(sample(idx, idx as f64)).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let view = handle.snapshot();
            assert_eq!(view.current.as_ref(), view.history.last());
        }
        writer.join().unwrap();
        assert_eq!(handle.snapshot().history.len(), 500);
    }

    #[test]
    fn restore_replaces_state() {
        let handle = FlightHandle::default();
        let mut state = FlightState::default();
        state.append(sample(0, 100.0)).unwrap();
        handle.restore(state.clone());
        assert_eq!(handle.export(), state);
        assert_eq!(handle.inspect(|s| s.history().len()), 1);
    }
}
