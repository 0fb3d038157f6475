//! Explicit burst markers embedded in APRS comment text.
//!
//! Two encodings are recognized, both case-insensitive and both carrying the
//! altitude in feet:
//!
//! * `BURST alt=105591.3ft lat=33.613055605 lon=-85.228266343` (keys in any order)
//! * `BURST 105591.3ft @ 33.613055605,-85.228266343`

use regex::Regex;
use std::sync::LazyLock;

use crate::math::units::feet_to_meters;
use crate::prelude::GeoPoint;

static KEYWORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bburst\b").unwrap());
static ALT_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\balt(?:itude)?\s*[=:]\s*(-?\d+(?:\.\d+)?)\s*(?:ft|')?").unwrap()
});
static LAT_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blat(?:itude)?\s*[=:]\s*(-?\d+(?:\.\d+)?)").unwrap());
static LON_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:lon|lng|long|longitude)\s*[=:]\s*(-?\d+(?:\.\d+)?)").unwrap()
});
static COMPACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bburst\b\D*?(\d+(?:\.\d+)?)\s*(?:ft|')\s*@\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)",
    )
    .unwrap()
});

/// A decoded burst marker, altitude already converted to meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl BurstMarker {
    /// Decodes a marker from comment text. Anything malformed yields `None`.
    pub fn parse(comment: &str) -> Option<Self> {
        if !KEYWORD.is_match(comment) {
            return None;
        }
        Self::parse_compact(comment)
            .or_else(|| Self::parse_fields(comment))
            .filter(|marker| marker.is_plausible())
    }

    fn parse_compact(comment: &str) -> Option<Self> {
        let captures = COMPACT.captures(comment)?;
        let altitude_ft: f64 = captures.get(1)?.as_str().parse().ok()?;
        let latitude: f64 = captures.get(2)?.as_str().parse().ok()?;
        let longitude: f64 = captures.get(3)?.as_str().parse().ok()?;
        Some(Self {
            latitude,
            longitude,
            altitude: feet_to_meters(altitude_ft),
        })
    }

    fn parse_fields(comment: &str) -> Option<Self> {
        let altitude_ft = capture_number(&ALT_FIELD, comment)?;
        let latitude = capture_number(&LAT_FIELD, comment)?;
        let longitude = capture_number(&LON_FIELD, comment)?;
        Some(Self {
            latitude,
            longitude,
            altitude: feet_to_meters(altitude_ft),
        })
    }

    fn is_plausible(&self) -> bool {
        GeoPoint::new(self.latitude, self.longitude).is_valid()
            && self.altitude.is_finite()
            && self.altitude >= 0.0
    }
}

fn capture_number(pattern: &Regex, text: &str) -> Option<f64> {
    pattern.captures(text)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_marker() {
        let marker =
            BurstMarker::parse("BURST alt=105591.3ft lat=33.613055605 lon=-85.228266343").unwrap();
        assert!((marker.altitude - 32_184.228).abs() < 1e-3);
        assert_eq!(marker.latitude, 33.613055605);
        assert_eq!(marker.longitude, -85.228266343);
    }

    #[test]
    fn parses_fields_in_any_order_and_case() {
        let marker =
            BurstMarker::parse("pkt 42 burst LNG=-85.2 Lat=33.6 Altitude: 100000").unwrap();
        assert_eq!(marker.latitude, 33.6);
        assert_eq!(marker.longitude, -85.2);
        assert!((marker.altitude - 30_480.0).abs() < 1e-9);
    }

    #[test]
    fn parses_compact_marker() {
        let marker = BurstMarker::parse("Burst 105591.3ft @ 33.613055605,-85.228266343").unwrap();
        assert!((marker.altitude - 32_184.228).abs() < 1e-3);
        assert_eq!(marker.longitude, -85.228266343);
    }

    #[test]
    fn comment_without_keyword_is_ignored() {
        assert_eq!(BurstMarker::parse("alt=1000ft lat=1 lon=2"), None);
        assert_eq!(BurstMarker::parse("11.2V 23C balloon payload"), None);
    }

    #[test]
    fn incomplete_or_invalid_marker_is_ignored() {
        assert_eq!(BurstMarker::parse("BURST alt=105591.3ft lat=33.6"), None);
        assert_eq!(BurstMarker::parse("BURST alt=1000ft lat=95.0 lon=10.0"), None);
        assert_eq!(BurstMarker::parse("BURST alt=abc lat=33.6 lon=-85.2"), None);
        assert_eq!(BurstMarker::parse("bursting soon"), None);
    }
}
