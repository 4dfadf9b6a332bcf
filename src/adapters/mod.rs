//! Concrete adapter implementations for ports.

pub mod csv_journal_adapter;
pub mod csv_market_data_adapter;
pub mod file_config_adapter;
pub mod json_snapshot_adapter;
pub mod log_notifier;
pub mod memory_snapshot_adapter;
pub mod paper_venue;
#[cfg(feature = "sqlite")]
pub mod sqlite_snapshot_adapter;
