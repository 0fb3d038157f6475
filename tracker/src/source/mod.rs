pub mod aprs;

use async_trait::async_trait;
use habcore::interface::StationReport;

pub use aprs::AprsClient;

/// Where station fixes come from. One call per station per cycle.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// `Ok(None)` means the station reported nothing new, which is not an error.
    async fn fetch_station(&self, callsign: &str) -> anyhow::Result<Option<StationReport>>;
}
