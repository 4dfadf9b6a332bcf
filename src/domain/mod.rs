//! Core domain: indicators, signal composition, sizing, positions and the risk ledger.

pub mod category;
pub mod config_validation;
pub mod cycle;
pub mod edge;
pub mod error;
pub mod indicator;
pub mod ledger;
pub mod position;
pub mod signal;
pub mod sizing;
pub mod stats;
