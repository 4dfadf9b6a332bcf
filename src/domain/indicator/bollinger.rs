//! Bollinger Bands.
//!
//! - Middle: SMA over the trailing `period` prices
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation of the same window. Series shorter than `period`
//! use every available point instead of waiting for a warmup.

use super::sma::sma;
use super::stddev::stddev;
use super::tail;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn bollinger_bands(series: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    if series.is_empty() {
        return BollingerBands::default();
    }
    let middle = sma(series, period);
    let width = multiplier * stddev(tail(series, period));
    BollingerBands {
        upper: middle + width,
        middle,
        lower: middle - width,
    }
}

/// Where `price` sits inside the bands: 0 at the lower band, 1 at the upper band, outside [0,1]
/// beyond them. A collapsed band reads as neutral 0.5.
pub fn bollinger_position(price: f64, upper: f64, lower: f64) -> f64 {
    if upper == lower {
        return 0.5;
    }
    (price - lower) / (upper - lower)
}
