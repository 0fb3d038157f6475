use crate::source::TelemetrySource;
use crate::workflow::config::AprsSettings;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use habcore::interface::{PositionSample, StationReport};
use serde::Deserialize;
use serde_json::Value;

/// Client for the aprs.fi `what=loc` JSON API.
pub struct AprsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct AprsResponse {
    result: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    entries: Vec<AprsEntry>,
}

/// aprs.fi sends most numbers as strings; both forms are accepted.
#[derive(Debug, Deserialize)]
struct AprsEntry {
    name: String,
    #[serde(default)]
    lat: Option<Value>,
    #[serde(default)]
    lng: Option<Value>,
    #[serde(default)]
    altitude: Option<Value>,
    #[serde(default)]
    time: Option<Value>,
    #[serde(default)]
    course: Option<Value>,
    #[serde(default)]
    speed: Option<Value>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

impl AprsEntry {
    fn into_report(self, fetched_at: DateTime<Utc>) -> anyhow::Result<StationReport> {
        let latitude = number(self.lat.as_ref())
            .ok_or_else(|| anyhow!("{}: missing or invalid latitude", self.name))?;
        let longitude = number(self.lng.as_ref())
            .ok_or_else(|| anyhow!("{}: missing or invalid longitude", self.name))?;
        let timestamp = number(self.time.as_ref())
            .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
            .unwrap_or(fetched_at);

        let mut sample = PositionSample::new(latitude, longitude, timestamp).with_motion(
            number(self.course.as_ref()),
            number(self.speed.as_ref()),
        );
        sample.altitude = number(self.altitude.as_ref());
        sample.comment = self.comment.filter(|c| !c.is_empty());
        sample.validate()?;

        Ok(StationReport {
            callsign: self.name,
            sample,
            symbol: self.symbol.filter(|s| !s.is_empty()),
        })
    }
}

fn parse_response(body: &str, fetched_at: DateTime<Utc>) -> anyhow::Result<Option<StationReport>> {
    let response: AprsResponse = serde_json::from_str(body).context("decoding aprs.fi response")?;
    if response.result != "ok" {
        bail!(
            "aprs.fi returned {}: {}",
            response.result,
            response.description.unwrap_or_default()
        );
    }
    match response.entries.into_iter().next() {
        Some(entry) => entry.into_report(fetched_at).map(Some),
        None => Ok(None),
    }
}

impl AprsClient {
    pub fn new(settings: &AprsSettings) -> anyhow::Result<Self> {
        let api_key = settings
            .resolved_api_key()
            .context("no aprs.fi API key configured (set aprs.apiKey or APRS_API_KEY)")?;
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("building aprs.fi HTTP client")?;
        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl TelemetrySource for AprsClient {
    async fn fetch_station(&self, callsign: &str) -> anyhow::Result<Option<StationReport>> {
        let body = self
            .http
            .get(&self.base_url)
            .query(&[
                ("name", callsign),
                ("what", "loc"),
                ("apikey", self.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .with_context(|| format!("requesting {callsign} from aprs.fi"))?
            .error_for_status()
            .with_context(|| format!("aprs.fi rejected request for {callsign}"))?
            .text()
            .await
            .with_context(|| format!("reading aprs.fi response for {callsign}"))?;
        parse_response(&body, Utc::now())
    }
}
