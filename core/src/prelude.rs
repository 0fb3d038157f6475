use serde::{Deserialize, Serialize};

/// Default number of samples retained in the flight history.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Thresholds driving the altitude-trend burst detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectorConfig {
    /// Altitude (m) the balloon must reach before descent monitoring starts.
    pub min_altitude_to_start: f64,
    /// Drop below the peak (m) that counts as significant.
    pub significant_drop: f64,
    /// Consecutive descending samples needed to confirm burst.
    pub required_descent_points: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_altitude_to_start: 3000.0,
            significant_drop: 1000.0,
            required_descent_points: 3,
        }
    }
}

/// A bare latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both coordinates are finite and inside their valid ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Common error type for calls that cross the core boundary.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("invalid sample: {0}")]
    InvalidSample(String),
    #[error("invalid prediction: {0}")]
    InvalidPrediction(String),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_point_rejects_out_of_range_and_nan() {
        assert!(GeoPoint::new(33.6, -85.2).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn detector_config_fills_missing_fields_with_defaults() {
        let cfg: DetectorConfig = serde_json::from_str(r#"{"significantDrop": 500.0}"#).unwrap();
        assert_eq!(cfg.significant_drop, 500.0);
        assert_eq!(cfg.min_altitude_to_start, 3000.0);
        assert_eq!(cfg.required_descent_points, 3);
    }
}
