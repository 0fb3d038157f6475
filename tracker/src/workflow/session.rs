use crate::api::model::{ChaserStatus, TrackingModel};
use chrono::{DateTime, Utc};
use habcore::interface::StationReport;
use habcore::{FlightHandle, FlightState};
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// On-disk form of a tracking session; enough to resume after a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTracking {
    pub flight: FlightState,
    #[serde(default)]
    pub chasers: Vec<ChaserStatus>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Surroundings {
    chasers: Vec<ChaserStatus>,
    last_update: Option<DateTime<Utc>>,
}

/// The balloon flight plus the chase vehicles around it.
pub struct TrackingSession {
    flight: FlightHandle,
    surroundings: RwLock<Surroundings>,
}

impl TrackingSession {
    pub fn new(flight: FlightState) -> Self {
        Self {
            flight: FlightHandle::new(flight),
            surroundings: RwLock::new(Surroundings::default()),
        }
    }

    pub fn flight(&self) -> &FlightHandle {
        &self.flight
    }

    /// Replaces the chaser list, measuring each against the balloon's current fix.
    pub fn update_chasers(&self, reports: Vec<StationReport>) {
        let chasers = self.flight.inspect(|state| {
            reports
                .into_iter()
                .map(|report| ChaserStatus::new(report, state.current()))
                .collect::<Vec<_>>()
        });
        self.surroundings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .chasers = chasers;
    }

    pub fn touch(&self, at: DateTime<Utc>) {
        self.surroundings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .last_update = Some(at);
    }

    pub fn chasers(&self) -> Vec<ChaserStatus> {
        self.surroundings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .chasers
            .clone()
    }

    pub fn model(&self) -> TrackingModel {
        let balloon = self.flight.snapshot();
        let surroundings = self.surroundings.read().unwrap_or_else(PoisonError::into_inner);
        TrackingModel {
            balloon,
            chasers: surroundings.chasers.clone(),
            last_update: surroundings.last_update,
        }
    }

    /// Clears the flight (thresholds kept), chasers and update time.
    pub fn reset(&self) {
        self.flight.reset();
        *self.surroundings.write().unwrap_or_else(PoisonError::into_inner) =
            Surroundings::default();
    }

    pub fn persisted(&self) -> PersistedTracking {
        let flight = self.flight.export();
        let surroundings = self.surroundings.read().unwrap_or_else(PoisonError::into_inner);
        PersistedTracking {
            flight,
            chasers: surroundings.chasers.clone(),
            last_update: surroundings.last_update,
        }
    }

    pub fn restore(&self, persisted: PersistedTracking) {
        self.flight.restore(persisted.flight);
        *self.surroundings.write().unwrap_or_else(PoisonError::into_inner) = Surroundings {
            chasers: persisted.chasers,
            last_update: persisted.last_update,
        };
    }
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self::new(FlightState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use habcore::interface::PositionSample;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn chasers_are_measured_against_current_balloon_fix() {
        let session = TrackingSession::default();
        session
            .flight()
            .append(PositionSample::new(34.1, -85.0, at(0)).with_altitude(1000.0))
            .unwrap();
        session.update_chasers(vec![StationReport::new(
            "KD4ABC-9",
            PositionSample::new(34.0, -85.0, at(0)),
        )]);

        let chasers = session.chasers();
        assert_eq!(chasers.len(), 1);
        assert!(chasers[0].distance_to_balloon_km.unwrap() > 10.0);
    }

    #[test]
    fn reset_clears_everything() {
        let session = TrackingSession::default();
        session
            .flight()
            .append(PositionSample::new(34.1, -85.0, at(0)))
            .unwrap();
        session.update_chasers(vec![StationReport::new(
            "KD4ABC-9",
            PositionSample::new(34.0, -85.0, at(0)),
        )]);
        session.touch(at(5));

        session.reset();
        let model = session.model();
        assert!(model.balloon.history.is_empty());
        assert!(model.chasers.is_empty());
        assert_eq!(model.last_update, None);
    }

    #[test]
    fn persisted_round_trip_restores_session() {
        let session = TrackingSession::default();
        session
            .flight()
            .append(PositionSample::new(34.1, -85.0, at(0)).with_altitude(3500.0))
            .unwrap();
        session.touch(at(60));
        let persisted = session.persisted();

        let restored = TrackingSession::default();
        restored.restore(persisted);
        let model = restored.model();
        assert_eq!(model.balloon.history.len(), 1);
        assert_eq!(model.last_update, Some(at(60)));
        assert_eq!(model.balloon.detection.peak_altitude, 3500.0);
    }
}
