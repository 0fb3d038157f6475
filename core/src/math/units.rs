pub const METERS_PER_FOOT: f64 = 0.3048;
pub const MILES_PER_KM: f64 = 0.621371;

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * METERS_PER_FOOT
}

pub fn meters_to_feet(meters: f64) -> f64 {
    meters / METERS_PER_FOOT
}

pub fn km_to_miles(km: f64) -> f64 {
    km * MILES_PER_KM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_altitude_converts_to_meters() {
        let meters = feet_to_meters(105_591.3);
        assert!((meters - 32_184.228).abs() < 1e-3);
    }

    #[test]
    fn feet_and_meters_are_inverse() {
        assert!((meters_to_feet(feet_to_meters(1234.5)) - 1234.5).abs() < 1e-9);
    }

    #[test]
    fn km_to_miles_scales() {
        assert!((km_to_miles(100.0) - 62.1371).abs() < 1e-9);
    }
}
