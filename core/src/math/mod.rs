pub mod geodesy;
pub mod units;

pub use geodesy::{bearing_deg, destination_point, distance_km, EARTH_RADIUS_KM};
pub use units::{feet_to_meters, km_to_miles, meters_to_feet};
