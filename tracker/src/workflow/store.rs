use crate::workflow::config::{normalize_callsign, TrackerConfig};
use anyhow::{bail, Context};
use habcore::prelude::DetectorConfig;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

/// Live configuration shared by the ingestion loop and the HTTP API.
///
/// Every successful update is written back to `path` when one is set.
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<TrackerConfig>,
}

impl ConfigStore {
    pub fn new(config: TrackerConfig, path: Option<PathBuf>) -> Self {
        Self {
            path,
            current: RwLock::new(config.normalized()),
        }
    }

    pub fn get(&self) -> TrackerConfig {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn modify(
        &self,
        change: impl FnOnce(&mut TrackerConfig) -> anyhow::Result<()>,
    ) -> anyhow::Result<TrackerConfig> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        change(&mut next)?;
        let next = next.normalized();
        if let Some(path) = &self.path {
            next.save(path)?;
        }
        *guard = next.clone();
        Ok(next)
    }

    /// Deep-merges a partial JSON document into the current configuration.
    pub fn merge(&self, patch: Value) -> anyhow::Result<TrackerConfig> {
        self.modify(|config| {
            let mut merged = serde_json::to_value(&*config).context("serializing config")?;
            merge_json(&mut merged, patch);
            *config = serde_json::from_value(merged).context("applying config update")?;
            Ok(())
        })
    }

    pub fn set_balloon_callsign(&self, callsign: &str) -> anyhow::Result<TrackerConfig> {
        let callsign = normalize_callsign(callsign);
        if callsign.is_empty() {
            bail!("callsign is required");
        }
        self.modify(|config| {
            config.balloon_callsign = callsign;
            Ok(())
        })
    }

    pub fn add_chaser(&self, callsign: &str) -> anyhow::Result<TrackerConfig> {
        let callsign = normalize_callsign(callsign);
        if callsign.is_empty() {
            bail!("callsign is required");
        }
        self.modify(|config| {
            config.chaser_callsigns.push(callsign);
            Ok(())
        })
    }

    pub fn remove_chaser(&self, callsign: &str) -> anyhow::Result<TrackerConfig> {
        let callsign = normalize_callsign(callsign);
        self.modify(|config| {
            config.chaser_callsigns.retain(|c| *c != callsign);
            Ok(())
        })
    }

    pub fn set_detector(&self, detector: DetectorConfig) -> anyhow::Result<TrackerConfig> {
        if detector.min_altitude_to_start < 0.0 || detector.significant_drop < 0.0 {
            bail!("detector thresholds must not be negative");
        }
        self.modify(|config| {
            config.detector = detector;
            Ok(())
        })
    }

    pub fn set_update_interval(&self, secs: u64) -> anyhow::Result<TrackerConfig> {
        if secs == 0 {
            bail!("update interval must be at least one second");
        }
        self.modify(|config| {
            config.update_interval_secs = secs;
            Ok(())
        })
    }

    /// Restores defaults while keeping where files and the server live.
    pub fn reset(&self) -> anyhow::Result<TrackerConfig> {
        self.modify(|config| {
            let defaults = TrackerConfig::default();
            *config = TrackerConfig {
                data_dir: config.data_dir.clone(),
                bind_address: config.bind_address.clone(),
                aprs: config.aprs.clone(),
                ..defaults
            };
            Ok(())
        })
    }
}

fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
