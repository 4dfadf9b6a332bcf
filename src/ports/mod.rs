//! Port traits: the engine's only contact with the outside world.

pub mod clock_port;
pub mod config_port;
pub mod execution_port;
pub mod journal_port;
pub mod market_data_port;
pub mod notification_port;
pub mod snapshot_port;
