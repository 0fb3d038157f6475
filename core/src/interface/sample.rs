use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prelude::{GeoPoint, TrackerError, TrackerResult};

/// One reported position/altitude/time observation for a tracked station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above mean sea level.
    #[serde(default)]
    pub altitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub course: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            timestamp,
            course: None,
            speed: None,
            comment: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_motion(mut self, course: Option<f64>, speed: Option<f64>) -> Self {
        self.course = course;
        self.speed = speed;
        self
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Rejects samples whose coordinates are missing, non-finite or out of range.
    pub fn validate(&self) -> TrackerResult<()> {
        if !self.position().is_valid() {
            return Err(TrackerError::InvalidSample(format!(
                "coordinates out of range: ({}, {})",
                self.latitude, self.longitude
            )));
        }
        if let Some(altitude) = self.altitude {
            if !altitude.is_finite() {
                return Err(TrackerError::InvalidSample(
                    "altitude is not a finite number".into(),
                ));
            }
        }
        Ok(())
    }
}

/// A position fix attributed to a named station (balloon or chase vehicle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationReport {
    pub callsign: String,
    #[serde(flatten)]
    pub sample: PositionSample,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl StationReport {
    pub fn new(callsign: impl Into<String>, sample: PositionSample) -> Self {
        Self {
            callsign: callsign.into(),
            sample,
            symbol: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn sample_validation_rejects_bad_coordinates() {
        assert!(PositionSample::new(33.6, -85.2, at(0)).validate().is_ok());
        let err = PositionSample::new(f64::NAN, -85.2, at(0)).validate();
        assert!(matches!(err, Err(TrackerError::InvalidSample(_))));
        let err = PositionSample::new(10.0, 200.0, at(0)).validate();
        assert!(matches!(err, Err(TrackerError::InvalidSample(_))));
    }

    #[test]
    fn sample_validation_rejects_infinite_altitude() {
        let sample = PositionSample::new(10.0, 10.0, at(0)).with_altitude(f64::INFINITY);
        assert!(sample.validate().is_err());
    }

    #[test]
    fn station_report_serializes_flat() {
        let report = StationReport::new(
            "N4BWR-11",
            PositionSample::new(33.6, -85.2, at(1_700_000_000)).with_altitude(1200.0),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["callsign"], "N4BWR-11");
        assert_eq!(json["altitude"], 1200.0);
        assert_eq!(json["latitude"], 33.6);
    }
}
