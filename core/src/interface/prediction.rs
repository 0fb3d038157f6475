use serde::{Deserialize, Serialize};

use crate::math::geodesy::{bearing_deg, distance_km};
use crate::prelude::GeoPoint;

/// A point from an externally authored flight prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters; predictions without altitude report 0.
    #[serde(default)]
    pub altitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PredictionPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            name: None,
            description: None,
        }
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Drift implied by a prediction: the great-circle leg from burst to landing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetrics {
    /// Kilometers.
    pub distance: f64,
    /// Degrees in `[0, 360)`.
    pub bearing: f64,
}

impl PredictionMetrics {
    pub fn between(burst: &PredictionPoint, landing: &PredictionPoint) -> Self {
        Self {
            distance: distance_km(
                burst.latitude,
                burst.longitude,
                landing.latitude,
                landing.longitude,
            ),
            bearing: bearing_deg(
                burst.latitude,
                burst.longitude,
                landing.latitude,
                landing.longitude,
            ),
        }
    }
}

/// Pre-flight prediction of burst and landing, plus whatever path data came with it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    #[serde(default)]
    pub burst_point: Option<PredictionPoint>,
    #[serde(default)]
    pub landing_point: Option<PredictionPoint>,
    #[serde(default)]
    pub path: Vec<PredictionPoint>,
    #[serde(default)]
    pub waypoints: Vec<PredictionPoint>,
    /// Cached burst-to-landing leg; present only when both endpoints are.
    #[serde(default)]
    pub metrics: Option<PredictionMetrics>,
}

impl Prediction {
    pub fn new(burst_point: PredictionPoint, landing_point: PredictionPoint) -> Self {
        let mut prediction = Self {
            burst_point: Some(burst_point),
            landing_point: Some(landing_point),
            ..Default::default()
        };
        prediction.refresh_metrics();
        prediction
    }

    /// Drops any cached metrics and recomputes them from the current endpoints.
    pub fn refresh_metrics(&mut self) -> Option<PredictionMetrics> {
        self.metrics = match (&self.burst_point, &self.landing_point) {
            (Some(burst), Some(landing)) => Some(PredictionMetrics::between(burst, landing)),
            _ => None,
        };
        self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_prediction_caches_metrics() {
        let prediction = Prediction::new(
            PredictionPoint::new(40.0, -90.0, 30_000.0),
            PredictionPoint::new(40.5, -89.0, 200.0),
        );
        let metrics = prediction.metrics.expect("metrics cached on construction");
        assert!(metrics.distance > 90.0 && metrics.distance < 110.0);
        assert!(metrics.bearing > 45.0 && metrics.bearing < 60.0);
    }

    #[test]
    fn metrics_absent_without_both_endpoints() {
        let mut prediction = Prediction {
            burst_point: Some(PredictionPoint::new(40.0, -90.0, 0.0)),
            ..Default::default()
        };
        assert_eq!(prediction.refresh_metrics(), None);
        assert_eq!(prediction.metrics, None);
    }

    #[test]
    fn refresh_replaces_stale_metrics() {
        let mut prediction = Prediction::new(
            PredictionPoint::new(40.0, -90.0, 0.0),
            PredictionPoint::new(40.5, -89.0, 0.0),
        );
        prediction.metrics = Some(PredictionMetrics {
            distance: 1.0,
            bearing: 1.0,
        });
        let refreshed = prediction.refresh_metrics().unwrap();
        assert!(refreshed.distance > 90.0);
    }

    #[test]
    fn prediction_reads_camel_case_wire_names() {
        let json = r#"{
            "burstPoint": {"latitude": 40.0, "longitude": -90.0, "altitude": 31000},
            "landingPoint": {"latitude": 40.5, "longitude": -89.0}
        }"#;
        let prediction: Prediction = serde_json::from_str(json).unwrap();
        assert_eq!(prediction.burst_point.as_ref().unwrap().altitude, 31_000.0);
        assert_eq!(prediction.landing_point.unwrap().altitude, 0.0);
    }
}
