//! Closed-trade journal port trait.

use crate::domain::error::TraderError;
use crate::domain::position::ClosedTrade;

pub trait JournalPort {
    fn append(&mut self, trade: &ClosedTrade) -> Result<(), TraderError>;
}
