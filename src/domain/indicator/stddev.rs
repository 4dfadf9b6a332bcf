//! Mean, population standard deviation, z-score and windowed volatility.
//!
//! Standard deviation divides by N, not N-1. Degenerate inputs (empty series, a single point,
//! zero variance) produce 0 rather than an error so callers read them as "no opinion".

use super::tail;

pub fn mean(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.iter().sum::<f64>() / series.len() as f64
}

pub fn stddev(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let m = mean(series);
    let variance = series
        .iter()
        .map(|p| {
            let diff = p - m;
            diff * diff
        })
        .sum::<f64>()
        / series.len() as f64;
    variance.sqrt()
}

/// Number of standard deviations `price` lies from the mean of `series`.
pub fn z_score(price: f64, series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let sd = stddev(series);
    if sd == 0.0 {
        return 0.0;
    }
    (price - mean(series)) / sd
}

/// Standard deviation of the last `period` points, or of the whole series if shorter.
pub fn volatility(series: &[f64], period: usize) -> f64 {
    stddev(tail(series, period))
}
