//! Append-only CSV trade journal.

use crate::domain::error::TraderError;
use crate::domain::position::ClosedTrade;
use crate::ports::journal_port::JournalPort;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

pub struct CsvJournalAdapter {
    path: PathBuf,
}

fn journal_err(path: &Path, e: impl std::fmt::Display) -> TraderError {
    TraderError::Journal {
        reason: format!("{}: {e}", path.display()),
    }
}

impl CsvJournalAdapter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Every recorded trade in file order. A missing journal reads as empty.
    pub fn read_all(&self) -> Result<Vec<ClosedTrade>, TraderError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| journal_err(&self.path, e))?;
        let mut trades = Vec::new();
        for row in rdr.deserialize() {
            trades.push(row.map_err(|e| journal_err(&self.path, e))?);
        }
        Ok(trades)
    }
}

impl JournalPort for CsvJournalAdapter {
    fn append(&mut self, trade: &ClosedTrade) -> Result<(), TraderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| journal_err(&self.path, e))?;
        }
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| journal_err(&self.path, e))?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        wtr.serialize(trade).map_err(|e| journal_err(&self.path, e))?;
        wtr.flush().map_err(|e| journal_err(&self.path, e))?;
        Ok(())
    }
}
