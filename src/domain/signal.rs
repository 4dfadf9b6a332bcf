//! Multi-indicator mean-reversion signal.
//!
//! Each indicator is scored into [-1, +1] (negative = buy pressure), the scores are blended with
//! fixed weights, and the composite is bucketed into a categorical `SignalKind`. A spread wider
//! than `max_spread_pct` short-circuits everything to `SignalKind::None`.

use std::fmt;

use super::indicator::{IndicatorParams, IndicatorSet};
use super::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    StrongBuy,
    Buy,
    Sell,
    StrongSell,
    None,
}

impl SignalKind {
    /// Trade direction implied by the signal, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            SignalKind::StrongBuy | SignalKind::Buy => Some(Side::Buy),
            SignalKind::StrongSell | SignalKind::Sell => Some(Side::Sell),
            SignalKind::None => None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.side().is_some()
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignalKind::StrongBuy => "STRONG_BUY",
            SignalKind::Buy => "BUY",
            SignalKind::Sell => "SELL",
            SignalKind::StrongSell => "STRONG_SELL",
            SignalKind::None => "NONE",
        };
        f.write_str(label)
    }
}

/// Breakpoints, weights and thresholds of the composer. `Default` is the tuned parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub max_spread_pct: f64,
    pub indicators: IndicatorParams,
    pub strong_score: f64,
    pub weak_score: f64,
    pub z_strong: f64,
    pub z_weak: f64,
    pub rsi_strong_oversold: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_strong_overbought: f64,
    pub band_low: f64,
    pub band_high: f64,
    pub z_weight: f64,
    pub rsi_weight: f64,
    pub band_weight: f64,
    pub strong_threshold: f64,
    pub threshold: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            max_spread_pct: 5.0,
            indicators: IndicatorParams::default(),
            strong_score: 1.0,
            weak_score: 0.6,
            z_strong: 2.0,
            z_weak: 1.2,
            rsi_strong_oversold: 20.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            rsi_strong_overbought: 80.0,
            band_low: 0.2,
            band_high: 0.8,
            z_weight: 0.5,
            rsi_weight: 0.25,
            band_weight: 0.25,
            strong_threshold: 0.7,
            threshold: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub confidence: f64,
    pub composite: f64,
    /// Absent when the liquidity gate rejected the market before any indicator ran.
    pub indicators: Option<IndicatorSet>,
}

impl Signal {
    fn none() -> Self {
        Signal {
            kind: SignalKind::None,
            confidence: 0.0,
            composite: 0.0,
            indicators: None,
        }
    }
}

/// Scores a z-score; the breakpoints are inclusive.
pub fn score_z(z: f64, config: &SignalConfig) -> f64 {
    if z <= -config.z_strong {
        -config.strong_score
    } else if z <= -config.z_weak {
        -config.weak_score
    } else if z >= config.z_strong {
        config.strong_score
    } else if z >= config.z_weak {
        config.weak_score
    } else {
        0.0
    }
}

pub fn score_rsi(rsi: f64, config: &SignalConfig) -> f64 {
    if rsi < config.rsi_strong_oversold {
        -config.strong_score
    } else if rsi < config.rsi_oversold {
        -config.weak_score
    } else if rsi > config.rsi_strong_overbought {
        config.strong_score
    } else if rsi > config.rsi_overbought {
        config.weak_score
    } else {
        0.0
    }
}

pub fn score_band(position: f64, config: &SignalConfig) -> f64 {
    if position < 0.0 {
        -config.strong_score
    } else if position < config.band_low {
        -config.weak_score
    } else if position > 1.0 {
        config.strong_score
    } else if position > config.band_high {
        config.weak_score
    } else {
        0.0
    }
}

/// Weighted blend of the three indicator scores.
pub fn composite_score(z: f64, rsi: f64, band_position: f64, config: &SignalConfig) -> f64 {
    score_z(z, config) * config.z_weight
        + score_rsi(rsi, config) * config.rsi_weight
        + score_band(band_position, config) * config.band_weight
}

pub fn classify_composite(composite: f64, config: &SignalConfig) -> SignalKind {
    if composite <= -config.strong_threshold {
        SignalKind::StrongBuy
    } else if composite <= -config.threshold {
        SignalKind::Buy
    } else if composite >= config.strong_threshold {
        SignalKind::StrongSell
    } else if composite >= config.threshold {
        SignalKind::Sell
    } else {
        SignalKind::None
    }
}

/// Produces the trading signal for one market.
pub fn compose_signal(
    price: f64,
    history: &[f64],
    z_score: f64,
    spread_pct: f64,
    config: &SignalConfig,
) -> Signal {
    if spread_pct > config.max_spread_pct {
        return Signal::none();
    }

    let indicators = IndicatorSet::compute(price, history, z_score, &config.indicators);
    let composite = composite_score(
        indicators.z_score,
        indicators.rsi,
        indicators.bollinger_position,
        config,
    );
    let kind = classify_composite(composite, config);
    let confidence = if kind.is_actionable() {
        composite.abs().min(1.0)
    } else {
        0.0
    };

    Signal {
        kind,
        confidence,
        composite,
        indicators: Some(indicators),
    }
}
