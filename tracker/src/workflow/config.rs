use anyhow::Context;
use habcore::prelude::{DetectorConfig, DEFAULT_HISTORY_LIMIT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_APRS_URL: &str = "https://api.aprs.fi/api/get";

/// aprs.fi asks clients not to poll more often than this.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 120;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AprsSettings {
    pub base_url: String,
    /// Falls back to the `APRS_API_KEY` environment variable when unset.
    pub api_key: Option<String>,
    pub user_agent: String,
}

impl Default for AprsSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_APRS_URL.to_string(),
            api_key: None,
            user_agent: format!("balloon-tracker/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl AprsSettings {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var("APRS_API_KEY").ok())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    pub balloon_callsign: String,
    pub chaser_callsigns: Vec<String>,
    pub detector: DetectorConfig,
    pub update_interval_secs: u64,
    pub max_history_length: usize,
    pub aprs: AprsSettings,
    pub data_dir: PathBuf,
    pub bind_address: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            balloon_callsign: String::new(),
            chaser_callsigns: Vec::new(),
            detector: DetectorConfig::default(),
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            max_history_length: DEFAULT_HISTORY_LIMIT,
            aprs: AprsSettings::default(),
            data_dir: PathBuf::from("data"),
            bind_address: "127.0.0.1:3001".to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading tracker config {}", path_ref.display()))?;
        let config: TrackerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing tracker config {}", path_ref.display()))?;
        Ok(config.normalized())
    }

    /// Loads `path`, writing a default config there first if it does not exist yet.
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        if path_ref.exists() {
            return Self::load(path_ref);
        }
        log::info!("no config at {}, writing defaults", path_ref.display());
        let config = Self::default();
        config.save(path_ref)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self).context("serializing tracker config")?;
        fs::write(path_ref, yaml)
            .with_context(|| format!("writing tracker config {}", path_ref.display()))?;
        Ok(())
    }

    /// Upper-cases callsigns and drops blanks and duplicate chasers.
    pub fn normalized(mut self) -> Self {
        self.balloon_callsign = normalize_callsign(&self.balloon_callsign);
        let mut chasers: Vec<String> = Vec::with_capacity(self.chaser_callsigns.len());
        for callsign in self.chaser_callsigns.iter().map(|c| normalize_callsign(c)) {
            if !callsign.is_empty() && !chasers.contains(&callsign) {
                chasers.push(callsign);
            }
        }
        self.chaser_callsigns = chasers;
        self.update_interval_secs = self.update_interval_secs.max(1);
        self.max_history_length = self.max_history_length.max(1);
        self
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("tracking.json")
    }
}

pub fn normalize_callsign(callsign: &str) -> String {
    callsign.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_follow_the_tracking_service() {
        let cfg = TrackerConfig::default();
        assert_eq!(cfg.max_history_length, 1000);
        assert_eq!(cfg.detector.min_altitude_to_start, 3000.0);
        assert_eq!(cfg.update_interval_secs, 120);
        assert!(cfg.balloon_callsign.is_empty());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"balloonCallsign: n4bwr-11\nchaserCallsigns: [n4bwr-9, N4BWR-9, ' ']\ndetector:\n  significantDrop: 800\nupdateIntervalSecs: 60\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = TrackerConfig::load(&path).unwrap();
        assert_eq!(cfg.balloon_callsign, "N4BWR-11");
        assert_eq!(cfg.chaser_callsigns, vec!["N4BWR-9".to_string()]);
        assert_eq!(cfg.detector.significant_drop, 800.0);
        assert_eq!(cfg.detector.required_descent_points, 3);
        assert_eq!(cfg.update_interval_secs, 60);
    }

    #[test]
    fn load_or_init_writes_defaults_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracker.yaml");
        let cfg = TrackerConfig::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg, TrackerConfig::default());

        let mut changed = cfg.clone();
        changed.chaser_callsigns.push("KD4ABC".into());
        changed.save(&path).unwrap();
        assert_eq!(TrackerConfig::load(&path).unwrap(), changed);
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"updateIntervalSecs: [not, a, number]\n").unwrap();
        let err = TrackerConfig::load(temp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing tracker config"));
    }
}
