//! In-process snapshot store for paper runs and tests.

use crate::domain::error::TraderError;
use crate::domain::ledger::Snapshot;
use crate::ports::snapshot_port::SnapshotPort;

#[derive(Debug, Default)]
pub struct MemorySnapshotAdapter {
    slot: Option<Snapshot>,
    saves: usize,
}

impl MemorySnapshotAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            slot: Some(snapshot),
            saves: 0,
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SnapshotPort for MemorySnapshotAdapter {
    fn load(&self) -> Result<Option<Snapshot>, TraderError> {
        Ok(self.slot.clone())
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), TraderError> {
        self.slot = Some(snapshot.clone());
        self.saves += 1;
        Ok(())
    }
}
