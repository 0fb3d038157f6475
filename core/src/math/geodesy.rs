//! Spherical-Earth great-circle helpers.
//!
//! All angles are in degrees and all distances in kilometers. Degenerate
//! inputs propagate NaN rather than failing.

use crate::prelude::GeoPoint;

/// Mean Earth radius used by every calculation here.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points using the haversine formula.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Initial bearing from point 1 towards point 2, in `[0, 360)`.
///
/// Identical points have no defined bearing; this returns 0 for them.
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let y = delta_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Point reached by travelling `distance_km` along `bearing_deg` from the origin.
///
/// The returned longitude is normalized into `[-180, 180)`.
pub fn destination_point(lat: f64, lon: f64, distance_km: f64, bearing_deg: f64) -> GeoPoint {
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let bearing = bearing_deg.to_radians();
    let angular = distance_km / EARTH_RADIUS_KM;

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    GeoPoint::new(lat2.to_degrees(), normalize_longitude(lon2.to_degrees()))
}

/// Convenience wrapper over [`distance_km`] for two [`GeoPoint`]s.
pub fn distance_between(from: &GeoPoint, to: &GeoPoint) -> f64 {
    distance_km(from.latitude, from.longitude, to.latitude, to.longitude)
}

/// Convenience wrapper over [`bearing_deg`] for two [`GeoPoint`]s.
pub fn bearing_between(from: &GeoPoint, to: &GeoPoint) -> f64 {
    bearing_deg(from.latitude, from.longitude, to.latitude, to.longitude)
}

fn normalize_bearing(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to the modulus itself for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

fn normalize_longitude(degrees: f64) -> f64 {
    let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        -180.0
    } else {
        wrapped
    }
}
