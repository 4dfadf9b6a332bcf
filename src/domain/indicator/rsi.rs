//! RSI (Relative Strength Index).
//!
//! Simple (not Wilder-smoothed) averages of the most recent `period` gains and losses:
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//!
//! Fewer than `period + 1` prices gives the neutral 50. With no losses in the window the result
//! is 100 if anything was gained and 50 for a flat window.

pub const DEFAULT_RSI_PERIOD: usize = 14;

const NEUTRAL: f64 = 50.0;

pub fn rsi(series: &[f64], period: usize) -> f64 {
    if period == 0 || series.len() < period + 1 {
        return NEUTRAL;
    }

    let window = &series[series.len() - (period + 1)..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return if avg_gain > 0.0 { 100.0 } else { NEUTRAL };
    }

    100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
}
