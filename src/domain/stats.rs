//! Statistics over closed trades: win rate, profit factor, expectancy, per-category and
//! per-exit-reason breakdowns, and rule-based tuning suggestions.
//!
//! Feeds the Kelly input for sizing and the `report` command.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;

use super::position::{ClosedTrade, ExitReason};
use super::sizing::kelly_fraction;

/// Floor applied to the total loss when forming the win/loss ratio.
const MIN_LOSS_DENOMINATOR: f64 = 0.01;

/// Trades needed in the window before any tuning suggestion is made.
pub const MIN_TRADES_FOR_SUGGESTIONS: usize = 5;
/// Trades a category needs before it is judged.
pub const MIN_CATEGORY_TRADES: usize = 3;
const LONG_HOLD_MINUTES: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    pub win_rate: f64,
    pub total_profit: f64,
    pub total_loss: f64,
    pub total_pnl: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub expectancy: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub avg_hold_minutes: f64,
    pub trades_per_day: f64,
}

impl TradeStats {
    pub fn compute(trades: &[ClosedTrade]) -> Self {
        let mut stats = TradeStats::default();
        if trades.is_empty() {
            return stats;
        }

        let mut best = f64::NEG_INFINITY;
        let mut worst = f64::INFINITY;
        let mut total_hold = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                stats.wins += 1;
                stats.total_profit += pnl;
            } else if pnl < 0.0 {
                stats.losses += 1;
                stats.total_loss += pnl.abs();
            } else {
                stats.breakeven += 1;
            }
            stats.total_pnl += pnl;
            best = best.max(pnl);
            worst = worst.min(pnl);
            total_hold += trade.hold_minutes;
        }

        let n = trades.len() as f64;
        stats.total_trades = trades.len();
        stats.win_rate = stats.wins as f64 / n;
        stats.profit_factor = if stats.total_loss > 0.0 {
            stats.total_profit / stats.total_loss
        } else if stats.total_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        stats.avg_win = if stats.wins > 0 {
            stats.total_profit / stats.wins as f64
        } else {
            0.0
        };
        stats.avg_loss = if stats.losses > 0 {
            stats.total_loss / stats.losses as f64
        } else {
            0.0
        };
        stats.expectancy = stats.win_rate * stats.avg_win - (1.0 - stats.win_rate) * stats.avg_loss;
        stats.best_trade = best;
        stats.worst_trade = worst;
        stats.avg_hold_minutes = total_hold / n;
        stats
    }

    /// Statistics over trades that exited within the last `days` days.
    pub fn over_window(trades: &[ClosedTrade], now: DateTime<Utc>, days: u32) -> Self {
        let cutoff = now - Duration::days(i64::from(days));
        let recent: Vec<ClosedTrade> = trades
            .iter()
            .filter(|t| t.exit_time > cutoff)
            .cloned()
            .collect();
        let mut stats = TradeStats::compute(&recent);
        if days > 0 {
            stats.trades_per_day = stats.total_trades as f64 / f64::from(days);
        }
        stats
    }

    pub fn win_loss_ratio(&self) -> f64 {
        self.total_profit / self.total_loss.max(MIN_LOSS_DENOMINATOR)
    }

    /// Kelly fraction for sizing: derived from these statistics once at least `min_trades`
    /// trades with a positive win rate exist, `default_kelly` otherwise.
    pub fn kelly_input(&self, min_trades: usize, default_kelly: f64, max_kelly: f64) -> f64 {
        if self.total_trades >= min_trades && self.win_rate > 0.0 {
            kelly_fraction(self.win_rate, self.win_loss_ratio(), max_kelly)
        } else {
            default_kelly
        }
    }
}

impl fmt::Display for TradeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Trades: {} ({} won / {} lost / {} even)",
            self.total_trades, self.wins, self.losses, self.breakeven
        )?;
        writeln!(f, "Win rate: {:.1}%", self.win_rate * 100.0)?;
        writeln!(f, "Profit factor: {:.2}", self.profit_factor)?;
        writeln!(f, "Expectancy: {:.4}", self.expectancy)?;
        writeln!(f, "Total P&L: {:.4}", self.total_pnl)?;
        writeln!(
            f,
            "Best / worst: {:.4} / {:.4}",
            self.best_trade, self.worst_trade
        )?;
        write!(
            f,
            "Avg hold: {:.1} min, {:.2} trades/day",
            self.avg_hold_minutes, self.trades_per_day
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryStats {
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub pnl: f64,
}

pub fn by_category(trades: &[ClosedTrade]) -> BTreeMap<String, CategoryStats> {
    let mut out: BTreeMap<String, CategoryStats> = BTreeMap::new();
    for trade in trades {
        let entry = out.entry(trade.category.clone()).or_default();
        entry.trades += 1;
        entry.pnl += trade.pnl;
        if trade.pnl > 0.0 {
            entry.wins += 1;
        }
    }
    for entry in out.values_mut() {
        entry.win_rate = entry.wins as f64 / entry.trades as f64;
    }
    out
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExitReasonStats {
    pub count: usize,
    pub pnl: f64,
}

pub fn by_exit_reason(trades: &[ClosedTrade]) -> BTreeMap<ExitReason, ExitReasonStats> {
    let mut out: BTreeMap<ExitReason, ExitReasonStats> = BTreeMap::new();
    for trade in trades {
        let entry = out.entry(trade.exit_reason).or_default();
        entry.count += 1;
        entry.pnl += trade.pnl;
    }
    out
}

/// A tuning hint derived from trade history.
#[derive(Debug, Clone, PartialEq)]
pub enum Suggestion {
    NeedMoreTrades { have: usize, need: usize },
    LowWinRate(f64),
    HighWinRate(f64),
    Unprofitable(f64),
    StrongProfitFactor(f64),
    LongHolds(f64),
    WeakCategory { category: String, win_rate: f64 },
    StrongCategory { category: String, win_rate: f64 },
    FrequentStopLoss(f64),
    NoChanges,
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suggestion::NeedMoreTrades { have, need } => write!(
                f,
                "need more trades before tuning ({have} of {need})"
            ),
            Suggestion::LowWinRate(rate) => write!(
                f,
                "win rate low ({:.1}%): consider a stricter signal threshold",
                rate * 100.0
            ),
            Suggestion::HighWinRate(rate) => write!(
                f,
                "win rate strong ({:.1}%): a looser signal threshold would trade more",
                rate * 100.0
            ),
            Suggestion::Unprofitable(pf) => write!(
                f,
                "profit factor below 1 ({pf:.2}): consider a tighter stop loss"
            ),
            Suggestion::StrongProfitFactor(pf) => write!(
                f,
                "profit factor strong ({pf:.2}): position size could grow"
            ),
            Suggestion::LongHolds(minutes) => write!(
                f,
                "long average hold ({minutes:.0} min): consider a closer take profit"
            ),
            Suggestion::WeakCategory { category, win_rate } => write!(
                f,
                "category '{category}' underperforms ({:.0}% win rate): consider skipping it",
                win_rate * 100.0
            ),
            Suggestion::StrongCategory { category, win_rate } => write!(
                f,
                "category '{category}' performs well ({:.0}% win rate): focus on it",
                win_rate * 100.0
            ),
            Suggestion::FrequentStopLoss(share) => write!(
                f,
                "stop loss hit on {:.0}% of trades: widen the stop or improve entry timing",
                share * 100.0
            ),
            Suggestion::NoChanges => write!(f, "no changes suggested"),
        }
    }
}

/// Rule-based tuning hints. `recent` gates and drives the headline rules; the category and
/// exit-reason rules look at `history`.
pub fn suggestions(recent: &TradeStats, history: &[ClosedTrade]) -> Vec<Suggestion> {
    if recent.total_trades < MIN_TRADES_FOR_SUGGESTIONS {
        return vec![Suggestion::NeedMoreTrades {
            have: recent.total_trades,
            need: MIN_TRADES_FOR_SUGGESTIONS,
        }];
    }

    let mut out = Vec::new();
    if recent.win_rate < 0.4 {
        out.push(Suggestion::LowWinRate(recent.win_rate));
    } else if recent.win_rate > 0.7 {
        out.push(Suggestion::HighWinRate(recent.win_rate));
    }

    if recent.profit_factor < 1.0 {
        out.push(Suggestion::Unprofitable(recent.profit_factor));
    } else if recent.profit_factor > 2.0 {
        out.push(Suggestion::StrongProfitFactor(recent.profit_factor));
    }

    if recent.avg_hold_minutes > LONG_HOLD_MINUTES {
        out.push(Suggestion::LongHolds(recent.avg_hold_minutes));
    }

    for (category, cat) in by_category(history) {
        if cat.trades < MIN_CATEGORY_TRADES {
            continue;
        }
        if cat.win_rate < 0.3 {
            out.push(Suggestion::WeakCategory {
                category,
                win_rate: cat.win_rate,
            });
        } else if cat.win_rate > 0.7 {
            out.push(Suggestion::StrongCategory {
                category,
                win_rate: cat.win_rate,
            });
        }
    }

    if let Some(stops) = by_exit_reason(history).get(&ExitReason::StopLoss) {
        let share = stops.count as f64 / history.len() as f64;
        if share > 0.5 {
            out.push(Suggestion::FrequentStopLoss(share));
        }
    }

    if out.is_empty() {
        out.push(Suggestion::NoChanges);
    }
    out
}
