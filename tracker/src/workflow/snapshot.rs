use crate::workflow::session::PersistedTracking;
use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// JSON file holding the latest tracking session.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes through a temp file in the same directory so readers never see half a snapshot.
    pub fn save(&self, tracking: &PersistedTracking) -> anyhow::Result<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating snapshot directory {}", dir.display()))?;

        let json = serde_json::to_vec_pretty(tracking).context("serializing tracking snapshot")?;
        let mut temp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("creating temp snapshot in {}", dir.display()))?;
        temp.write_all(&json).context("writing tracking snapshot")?;
        temp.persist(&self.path)
            .with_context(|| format!("replacing snapshot {}", self.path.display()))?;
        Ok(())
    }

    /// `Ok(None)` when no snapshot has been written yet.
    pub fn load(&self) -> anyhow::Result<Option<PersistedTracking>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading snapshot {}", self.path.display()))?;
        let tracking = serde_json::from_str(&contents)
            .with_context(|| format!("parsing snapshot {}", self.path.display()))?;
        Ok(Some(tracking))
    }
}
