//! CSV file market data adapter.
//!
//! Layout under the base directory:
//! - `<key>.csv` with `timestamp,bid,ask` rows; the latest row is the current book and the mids
//!   of all rows form the price history.
//! - optional `markets.csv` with `key,market_id,title` rows naming each market.

use crate::domain::edge::mid_price;
use crate::domain::error::TraderError;
use crate::ports::market_data_port::{MarketDataPort, MarketQuote};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const MARKETS_FILE: &str = "markets.csv";

#[derive(Debug, Deserialize)]
struct BookRow {
    timestamp: DateTime<Utc>,
    bid: f64,
    ask: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct MarketRow {
    key: String,
    market_id: String,
    title: String,
}

pub struct CsvMarketDataAdapter {
    base_path: PathBuf,
    markets: HashMap<String, MarketRow>,
}

impl CsvMarketDataAdapter {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, TraderError> {
        let base_path = base_path.as_ref().to_path_buf();
        let index = base_path.join(MARKETS_FILE);
        let mut markets = HashMap::new();
        if index.exists() {
            let mut rdr = csv::Reader::from_path(&index).map_err(|e| TraderError::MarketData {
                key: MARKETS_FILE.into(),
                reason: e.to_string(),
            })?;
            for row in rdr.deserialize::<MarketRow>() {
                let row = row.map_err(|e| TraderError::MarketData {
                    key: MARKETS_FILE.into(),
                    reason: format!("CSV parse error: {e}"),
                })?;
                markets.insert(row.key.clone(), row);
            }
        }
        Ok(Self { base_path, markets })
    }

    fn csv_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.csv"))
    }

    /// Keys listed in `markets.csv`, sorted.
    pub fn known_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.markets.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl MarketDataPort for CsvMarketDataAdapter {
    fn quote(&self, key: &str) -> Result<Option<MarketQuote>, TraderError> {
        let path = self.csv_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let err = |reason: String| TraderError::MarketData {
            key: key.to_string(),
            reason,
        };
        let mut rdr = csv::Reader::from_path(&path)
            .map_err(|e| err(format!("failed to read {}: {e}", path.display())))?;
        let mut rows = Vec::new();
        for row in rdr.deserialize::<BookRow>() {
            rows.push(row.map_err(|e| err(format!("CSV parse error: {e}")))?);
        }
        rows.sort_by_key(|r| r.timestamp);

        let Some(latest) = rows.last() else {
            return Ok(None);
        };
        let price = mid_price(latest.bid, latest.ask);
        if price <= 0.0 {
            return Ok(None);
        }

        let history = rows
            .iter()
            .map(|r| mid_price(r.bid, r.ask))
            .filter(|&mid| mid > 0.0)
            .collect();
        let (market_id, title) = match self.markets.get(key) {
            Some(m) => (m.market_id.clone(), m.title.clone()),
            None => (key.to_string(), key.to_string()),
        };

        Ok(Some(MarketQuote {
            key: key.to_string(),
            market_id,
            title,
            price,
            history,
            best_bid: latest.bid,
            best_ask: latest.ask,
        }))
    }
}
