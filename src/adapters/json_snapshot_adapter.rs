//! Ledger snapshot stored as a pretty-printed JSON file.

use crate::domain::error::TraderError;
use crate::domain::ledger::Snapshot;
use crate::ports::snapshot_port::SnapshotPort;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct JsonSnapshotAdapter {
    path: PathBuf,
}

impl JsonSnapshotAdapter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotPort for JsonSnapshotAdapter {
    fn load(&self) -> Result<Option<Snapshot>, TraderError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no snapshot file");
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path).map_err(|e| TraderError::Persistence {
            reason: format!("failed to read {}: {e}", self.path.display()),
        })?;
        let snapshot: Snapshot = serde_json::from_str(&json)?;
        Ok(Some(snapshot))
    }

    /// Writes next to the target and renames over it, so a crash never leaves a torn file.
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), TraderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| TraderError::Persistence {
            reason: format!("failed to write {}: {e}", tmp.display()),
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| TraderError::Persistence {
            reason: format!("failed to replace {}: {e}", self.path.display()),
        })?;
        Ok(())
    }
}
