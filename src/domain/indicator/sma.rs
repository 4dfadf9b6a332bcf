//! Simple moving average over the trailing window.

use super::stddev::mean;
use super::tail;

/// Mean of the last `period` points, or of the whole series if it is shorter than `period`.
pub fn sma(series: &[f64], period: usize) -> f64 {
    mean(tail(series, period))
}
