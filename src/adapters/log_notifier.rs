//! Notification sinks: one that writes events to the log, one that drops them.

use crate::domain::error::TraderError;
use crate::domain::ledger::LedgerEvent;
use crate::ports::notification_port::NotificationPort;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationPort for LogNotifier {
    fn notify(&mut self, event: &LedgerEvent) -> Result<(), TraderError> {
        match event {
            LedgerEvent::CooldownStarted { .. } => warn!(target: "notify", "{event}"),
            _ => info!(target: "notify", "{event}"),
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl NotificationPort for NullNotifier {
    fn notify(&mut self, _event: &LedgerEvent) -> Result<(), TraderError> {
        Ok(())
    }
}
