//! Open positions and their exit triggers.
//!
//! A position is OPEN from `Position::open` until the ledger settles it into a `ClosedTrade`.
//! Stop-loss and take-profit are fixed at construction; the only state that moves afterwards is
//! the high-water mark, which never decreases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    Manual,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::TakeProfit => "TAKE_PROFIT",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::Manual => "MANUAL",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for ExitReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "STOP_LOSS" => Ok(ExitReason::StopLoss),
            "TAKE_PROFIT" => Ok(ExitReason::TakeProfit),
            "TRAILING_STOP" => Ok(ExitReason::TrailingStop),
            "MANUAL" => Ok(ExitReason::Manual),
            other => Err(format!("unknown exit reason '{other}'")),
        }
    }
}

/// Exit-trigger percentages, as decimals of the entry price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitRules {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub trailing_stop_pct: f64,
    /// Gain over entry the current price must show before the trailing stop is consulted.
    pub trailing_activation_pct: f64,
}

impl Default for ExitRules {
    fn default() -> Self {
        ExitRules {
            stop_loss_pct: 0.15,
            take_profit_pct: 0.25,
            trailing_stop_pct: 0.10,
            trailing_activation_pct: 0.05,
        }
    }
}

/// Everything the caller decides about a new position.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub key: String,
    pub market_id: String,
    pub title: String,
    pub category: String,
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub shares: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub key: String,
    pub market_id: String,
    pub title: String,
    pub category: String,
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub shares: f64,
    pub entry_time: DateTime<Utc>,
    pub high_water_mark: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub trailing_stop_pct: f64,
    pub trailing_activation_pct: f64,
}

impl Position {
    /// Builds a position with every derived price computed up front.
    pub fn open(request: OpenRequest, rules: &ExitRules, now: DateTime<Utc>) -> Self {
        let entry = request.entry_price;
        Position {
            key: request.key,
            market_id: request.market_id,
            title: request.title,
            category: request.category,
            side: request.side,
            entry_price: entry,
            size: request.size,
            shares: request.shares,
            entry_time: now,
            high_water_mark: entry,
            stop_loss: entry * (1.0 - rules.stop_loss_pct),
            take_profit: entry * (1.0 + rules.take_profit_pct),
            trailing_stop_pct: rules.trailing_stop_pct,
            trailing_activation_pct: rules.trailing_activation_pct,
        }
    }

    pub fn on_price_update(&mut self, price: f64) {
        if price > self.high_water_mark {
            self.high_water_mark = price;
        }
    }

    pub fn trailing_stop(&self) -> f64 {
        self.high_water_mark * (1.0 - self.trailing_stop_pct)
    }

    /// First matching trigger wins: stop-loss, take-profit, then the trailing stop, which is
    /// only consulted while `price` itself is at least `trailing_activation_pct` over entry.
    pub fn evaluate_exit(&self, price: f64) -> Option<ExitReason> {
        if price <= self.stop_loss {
            return Some(ExitReason::StopLoss);
        }
        if price >= self.take_profit {
            return Some(ExitReason::TakeProfit);
        }
        if price >= self.entry_price * (1.0 + self.trailing_activation_pct)
            && price <= self.trailing_stop()
        {
            return Some(ExitReason::TrailingStop);
        }
        None
    }

    pub fn calculate_pnl(&self, exit_price: f64) -> f64 {
        match self.side {
            Side::Buy => (exit_price - self.entry_price) * self.shares,
            Side::Sell => (self.entry_price - exit_price) * self.shares,
        }
    }

    /// Mark-to-market P&L at `current_price`; same formula as settlement.
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.calculate_pnl(current_price)
    }

    pub fn hold_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.entry_time).num_seconds() as f64 / 60.0
    }

    pub fn settle(
        &self,
        exit_price: f64,
        reason: ExitReason,
        exit_time: DateTime<Utc>,
    ) -> ClosedTrade {
        ClosedTrade {
            exit_time,
            key: self.key.clone(),
            market_id: self.market_id.clone(),
            title: self.title.clone(),
            category: self.category.clone(),
            side: self.side,
            entry_price: self.entry_price,
            exit_price,
            size: self.size,
            shares: self.shares,
            pnl: self.calculate_pnl(exit_price),
            exit_reason: reason,
            hold_minutes: self.hold_minutes(exit_time),
        }
    }
}

/// Journal record of a settled position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub exit_time: DateTime<Utc>,
    pub key: String,
    pub market_id: String,
    pub title: String,
    pub category: String,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub shares: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
    pub hold_minutes: f64,
}
