//! Market data access port trait.

use crate::domain::error::TraderError;

/// Current book and price history for one tradable outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuote {
    pub key: String,
    pub market_id: String,
    pub title: String,
    /// Last traded or mid price, in (0, 1).
    pub price: f64,
    /// Chronological prices, oldest first.
    pub history: Vec<f64>,
    pub best_bid: f64,
    pub best_ask: f64,
}

pub trait MarketDataPort {
    /// `Ok(None)` when the market is unknown or has no usable book.
    fn quote(&self, key: &str) -> Result<Option<MarketQuote>, TraderError>;

    fn current_price(&self, key: &str) -> Result<Option<f64>, TraderError> {
        Ok(self.quote(key)?.map(|q| q.price))
    }
}
