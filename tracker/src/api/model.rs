use chrono::{DateTime, Utc};
use habcore::diagnostics::Metrics;
use habcore::interface::{PositionSample, StationReport};
use habcore::math::geodesy::{bearing_deg, distance_km};
use habcore::processing::{BurstEvent, CorrectedLanding};
use habcore::FlightStateView;
use serde::{Deserialize, Serialize};

/// A chase vehicle's latest fix plus its leg to the balloon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaserStatus {
    #[serde(flatten)]
    pub report: StationReport,
    pub distance_to_balloon_km: Option<f64>,
    pub bearing_to_balloon_deg: Option<f64>,
}

impl ChaserStatus {
    pub fn new(report: StationReport, balloon: Option<&PositionSample>) -> Self {
        let (distance, bearing) = match balloon {
            Some(target) => {
                let from = &report.sample;
                (
                    Some(distance_km(
                        from.latitude,
                        from.longitude,
                        target.latitude,
                        target.longitude,
                    )),
                    Some(bearing_deg(
                        from.latitude,
                        from.longitude,
                        target.latitude,
                        target.longitude,
                    )),
                )
            }
            None => (None, None),
        };
        Self {
            report,
            distance_to_balloon_km: distance,
            bearing_to_balloon_deg: bearing,
        }
    }
}

/// Everything `/api/tracking` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingModel {
    pub balloon: FlightStateView,
    pub chasers: Vec<ChaserStatus>,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstSummary {
    pub burst_detected: bool,
    pub actual_burst_point: Option<BurstEvent>,
    pub calculated_landing: Option<CorrectedLanding>,
}

impl From<&FlightStateView> for BurstSummary {
    fn from(view: &FlightStateView) -> Self {
        Self {
            burst_detected: view.burst_detected,
            actual_burst_point: view.burst_event.clone(),
            calculated_landing: view.corrected_landing.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub metrics: Metrics,
}
