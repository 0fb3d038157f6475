use anyhow::bail;
use chrono::{DateTime, Duration, TimeZone, Utc};
use habcore::interface::PositionSample;
use habcore::math::geodesy::destination_point;
use habcore::math::units::meters_to_feet;
use habcore::prelude::GeoPoint;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const MAX_SAMPLES: usize = 20_000;

/// Parameters for a synthetic ascent-burst-descent flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlightProfileConfig {
    pub callsign: String,
    pub launch_latitude: f64,
    pub launch_longitude: f64,
    /// Meters; the flight ends when descent reaches this again.
    pub launch_altitude: f64,
    pub burst_altitude: f64,
    /// Meters per second.
    pub ascent_rate: f64,
    pub descent_rate: f64,
    pub interval_secs: u32,
    /// Wind drift, degrees true and meters per second.
    pub drift_bearing: f64,
    pub drift_speed: f64,
    /// Uniform altitude jitter, +/- meters.
    pub noise: f64,
    pub seed: u64,
    pub start: DateTime<Utc>,
    /// Tag the burst sample with a `BURST alt=.. lat=.. lon=..` comment.
    pub burst_marker: bool,
}

impl Default for FlightProfileConfig {
    fn default() -> Self {
        Self {
            callsign: "SIM-11".to_string(),
            launch_latitude: 33.5,
            launch_longitude: -85.5,
            launch_altitude: 250.0,
            burst_altitude: 30_000.0,
            ascent_rate: 5.0,
            descent_rate: 8.0,
            interval_secs: 60,
            drift_bearing: 70.0,
            drift_speed: 10.0,
            noise: 20.0,
            seed: 7,
            start: Utc
                .timestamp_opt(1_700_000_000, 0)
                .single()
                .unwrap_or_else(Utc::now),
            burst_marker: false,
        }
    }
}

/// A generated flight plus the ground truth it was built from.
#[derive(Debug, Clone)]
pub struct GeneratedFlight {
    pub callsign: String,
    pub samples: Vec<PositionSample>,
    pub burst_index: usize,
    pub burst_point: GeoPoint,
    pub burst_altitude: f64,
    pub landing_point: GeoPoint,
}

impl GeneratedFlight {
    #[cfg(test)]
    pub fn burst_sample(&self) -> &PositionSample {
        &self.samples[self.burst_index]
    }
}

impl FlightProfileConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if !GeoPoint::new(self.launch_latitude, self.launch_longitude).is_valid() {
            bail!("launch point out of range");
        }
        if self.burst_altitude <= self.launch_altitude {
            bail!("burst altitude must be above launch altitude");
        }
        if self.ascent_rate <= 0.0 || self.descent_rate <= 0.0 {
            bail!("ascent and descent rates must be positive");
        }
        if self.interval_secs == 0 {
            bail!("sample interval must be at least one second");
        }
        if !self.noise.is_finite() || self.noise < 0.0 || self.drift_speed < 0.0 {
            bail!("noise and drift speed must not be negative");
        }
        Ok(())
    }

    pub fn generate(&self) -> anyhow::Result<GeneratedFlight> {
        self.validate()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let step_secs = f64::from(self.interval_secs);
        let step_km = self.drift_speed * step_secs / 1000.0;
        let speed_kmh = self.drift_speed * 3.6;

        let mut position = GeoPoint::new(self.launch_latitude, self.launch_longitude);
        let mut altitude = self.launch_altitude;
        let mut timestamp = self.start;
        let mut samples = Vec::new();
        let mut burst_index = None;

        loop {
            let mut sample = PositionSample::new(position.latitude, position.longitude, timestamp)
                .with_altitude(altitude)
                .with_motion(Some(self.drift_bearing), Some(speed_kmh));

            let at_burst = burst_index.is_none() && altitude >= self.burst_altitude;
            if at_burst {
                burst_index = Some(samples.len());
                if self.burst_marker {
                    sample = sample.with_comment(format!(
                        "BURST alt={:.1}ft lat={:.6} lon={:.6}",
                        meters_to_feet(altitude),
                        position.latitude,
                        position.longitude
                    ));
                }
            }
            samples.push(sample);

            let descending = burst_index.is_some();
            if descending && !at_burst && altitude <= self.launch_altitude {
                break;
            }
            if samples.len() >= MAX_SAMPLES {
                bail!("flight did not land within {MAX_SAMPLES} samples");
            }

            let jitter = rng.gen_range(-self.noise..=self.noise);
            altitude = if descending {
                (altitude - self.descent_rate * step_secs + jitter).max(self.launch_altitude)
            } else {
                (altitude + self.ascent_rate * step_secs + jitter).min(self.burst_altitude)
            };
            position = destination_point(
                position.latitude,
                position.longitude,
                step_km,
                self.drift_bearing,
            );
            timestamp += Duration::seconds(i64::from(self.interval_secs));
        }

        let burst_index = match burst_index {
            Some(index) => index,
            None => bail!("flight never reached burst altitude"),
        };
        let burst = &samples[burst_index];
        let burst_point = burst.position();
        let burst_altitude = burst.altitude.unwrap_or(self.burst_altitude);
        let landing_point = match samples.last() {
            Some(last) => last.position(),
            None => bail!("flight produced no samples"),
        };

        Ok(GeneratedFlight {
            callsign: self.callsign.clone(),
            samples,
            burst_index,
            burst_point,
            burst_altitude,
            landing_point,
        })
    }
}
