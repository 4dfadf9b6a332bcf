//! Ledger persistence port trait.

use crate::domain::error::TraderError;
use crate::domain::ledger::Snapshot;

/// Whole-image store for the ledger. Every `save` replaces the previous snapshot.
pub trait SnapshotPort {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Snapshot>, TraderError>;
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), TraderError>;
}
