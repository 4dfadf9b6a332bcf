//! Technical indicators over a probability price series.
//!
//! Every function here is pure and total over `&[f64]`: short or degenerate input yields a
//! neutral value, never an error.
//! - `stddev`: mean, population standard deviation, z-score, windowed volatility
//! - `sma`: simple moving average
//! - `bollinger`: bands and the price position within them
//! - `rsi`: relative strength index
//!
//! `IndicatorSet` bundles one evaluation's worth of readings for a single market.

pub mod bollinger;
pub mod rsi;
pub mod sma;
pub mod stddev;

use std::fmt;

pub use bollinger::{bollinger_bands, bollinger_position, BollingerBands};
pub use rsi::rsi;
pub use sma::sma;
pub use stddev::{mean, stddev, volatility, z_score};

/// The trailing `period` points of `series`, or all of it when shorter.
pub(crate) fn tail(series: &[f64], period: usize) -> &[f64] {
    if period == 0 || series.len() <= period {
        series
    } else {
        &series[series.len() - period..]
    }
}

/// Window lengths and band width used to build an `IndicatorSet`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    pub sma_period: usize,
    pub volatility_period: usize,
    pub bollinger_period: usize,
    pub bollinger_mult: f64,
    pub rsi_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            sma_period: 20,
            volatility_period: 20,
            bollinger_period: 20,
            bollinger_mult: 2.0,
            rsi_period: rsi::DEFAULT_RSI_PERIOD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub sma: f64,
    pub volatility: f64,
    pub z_score: f64,
    pub bollinger: BollingerBands,
    pub bollinger_position: f64,
    pub rsi: f64,
}

impl IndicatorSet {
    /// Computes every indicator for `price` against `history`. The z-score is supplied by the
    /// caller, who may have measured it against a different reference price (e.g. the mid).
    pub fn compute(price: f64, history: &[f64], z_score: f64, params: &IndicatorParams) -> Self {
        let bands = bollinger_bands(history, params.bollinger_period, params.bollinger_mult);
        IndicatorSet {
            sma: sma(history, params.sma_period),
            volatility: volatility(history, params.volatility_period),
            z_score,
            bollinger: bands,
            bollinger_position: bollinger_position(price, bands.upper, bands.lower),
            rsi: rsi(history, params.rsi_period),
        }
    }
}

impl fmt::Display for IndicatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "z={:.2} rsi={:.1} bb_pos={:.2} sma={:.4} vol={:.4}",
            self.z_score, self.rsi, self.bollinger_position, self.sma, self.volatility
        )
    }
}
