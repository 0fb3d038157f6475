use crate::generator::profile::GeneratedFlight;
use habcore::math::geodesy::{bearing_between, destination_point, distance_between};
use habcore::prelude::GeoPoint;
use std::fmt::Write;

/// Renders a pre-flight style KML prediction for `flight`.
///
/// The predicted burst sits `burst_offset_km` due north of where the flight
/// actually burst; the predicted landing keeps the true burst-to-landing leg,
/// so a corrected landing should fall back onto the real touchdown.
pub fn prediction_kml(flight: &GeneratedFlight, burst_offset_km: f64) -> String {
    let leg_km = distance_between(&flight.burst_point, &flight.landing_point);
    let leg_bearing = bearing_between(&flight.burst_point, &flight.landing_point);
    let predicted_burst = destination_point(
        flight.burst_point.latitude,
        flight.burst_point.longitude,
        burst_offset_km,
        0.0,
    );
    let predicted_landing = destination_point(
        predicted_burst.latitude,
        predicted_burst.longitude,
        leg_km,
        leg_bearing,
    );

    let mut path = String::new();
    for sample in &flight.samples {
        let _ = write!(
            path,
            "{:.6},{:.6},{:.1} ",
            sample.longitude,
            sample.latitude,
            sample.altitude.unwrap_or(0.0)
        );
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>{callsign} prediction</name>
    <Placemark>
      <name>Flight path</name>
      <LineString>
        <altitudeMode>absolute</altitudeMode>
        <coordinates>{path}</coordinates>
      </LineString>
    </Placemark>
    {burst}
    {landing}
  </Document>
</kml>
"#,
        callsign = flight.callsign,
        path = path.trim_end(),
        burst = placemark("Predicted burst", &predicted_burst, flight.burst_altitude),
        landing = placemark("Predicted landing", &predicted_landing, 0.0),
    )
}

fn placemark(name: &str, point: &GeoPoint, altitude: f64) -> String {
    format!(
        "<Placemark><name>{name}</name><Point><coordinates>{:.6},{:.6},{:.1}</coordinates></Point></Placemark>",
        point.longitude, point.latitude, altitude
    )
}
