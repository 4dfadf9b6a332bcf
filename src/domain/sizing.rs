//! Adaptive position sizing.
//!
//! Size starts from a fraction of balance, is capped by the half-Kelly fraction when one is
//! known, leans with win/lose streaks and signal confidence, and is finally clamped to the
//! configured trade bounds and a hard 30%-of-balance ceiling.

use serde::{Deserialize, Serialize};

/// Largest fraction of balance any single trade may commit.
pub const MAX_BALANCE_FRACTION: f64 = 0.30;

pub const DEFAULT_MAX_KELLY: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingInput {
    pub balance: f64,
    pub base_pct: f64,
    pub win_streak: u32,
    pub lose_streak: u32,
    pub confidence: f64,
    pub kelly_fraction: f64,
    pub min_size: f64,
    pub max_size: f64,
}

pub fn streak_multiplier(win_streak: u32, lose_streak: u32) -> f64 {
    if win_streak >= 3 {
        1.0 + f64::from((win_streak - 2).min(3)) * 0.15
    } else if lose_streak >= 2 {
        (1.0 - f64::from(lose_streak) * 0.2).max(0.5)
    } else {
        1.0
    }
}

pub fn confidence_multiplier(confidence: f64) -> f64 {
    if confidence >= 0.8 {
        1.2
    } else if confidence < 0.5 {
        0.8
    } else {
        1.0
    }
}

/// Trade size in currency units.
pub fn position_size(input: &SizingInput) -> f64 {
    let mut pct = input.base_pct;
    if input.kelly_fraction > 0.0 {
        pct = pct.min(input.kelly_fraction);
    }
    pct *= streak_multiplier(input.win_streak, input.lose_streak);
    pct *= confidence_multiplier(input.confidence);

    let size = (input.balance * pct).min(input.max_size).max(input.min_size);
    size.min(input.balance * MAX_BALANCE_FRACTION)
}

/// Half-Kelly bankroll fraction, clamped to `[0, max_kelly]`.
pub fn kelly_fraction(win_rate: f64, win_loss_ratio: f64, max_kelly: f64) -> f64 {
    if win_loss_ratio <= 0.0 {
        return 0.0;
    }
    let kelly = (win_rate - (1.0 - win_rate) / win_loss_ratio) / 2.0;
    kelly.min(max_kelly).max(0.0)
}

/// Consecutive win/loss counters. Exactly one of the two is non-zero once any trade closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakTracker {
    pub wins: u32,
    pub losses: u32,
}

impl StreakTracker {
    /// Breakeven trades count as losses.
    pub fn record(&mut self, pnl: f64) {
        if pnl > 0.0 {
            self.wins += 1;
            self.losses = 0;
        } else {
            self.losses += 1;
            self.wins = 0;
        }
    }
}
