//! Operator notification port trait.

use crate::domain::error::TraderError;
use crate::domain::ledger::LedgerEvent;

pub trait NotificationPort {
    fn notify(&mut self, event: &LedgerEvent) -> Result<(), TraderError>;
}
