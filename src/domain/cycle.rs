//! One decision cycle: settle exits, then scan candidates and open at most one position.

use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

use super::edge::{mid_price, spread_pct, CostModel, EdgeEvaluation};
use super::error::TraderError;
use super::indicator::z_score;
use super::ledger::{OpenCheck, Rejection, RiskLedger};
use super::position::{ExitReason, OpenRequest, Position, Side};
use super::signal::{compose_signal, Signal, SignalConfig};
use super::sizing::{position_size, SizingInput, DEFAULT_MAX_KELLY};
use super::stats::TradeStats;
use crate::ports::execution_port::{ExecutionPort, OrderRequest};
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    pub signal: SignalConfig,
    pub costs: CostModel,
    /// Fewest history points a market needs before it is scored.
    pub min_history: usize,
    pub base_pct: f64,
    pub default_kelly: f64,
    pub max_kelly: f64,
    pub min_trades_for_kelly: usize,
    pub stats_days: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        CycleConfig {
            signal: SignalConfig::default(),
            costs: CostModel::default(),
            min_history: 5,
            base_pct: 0.05,
            default_kelly: 0.05,
            max_kelly: DEFAULT_MAX_KELLY,
            min_trades_for_kelly: 5,
            stats_days: 7,
        }
    }
}

impl CycleConfig {
    pub fn kelly_for(&self, recent: &TradeStats) -> f64 {
        recent.kelly_input(self.min_trades_for_kelly, self.default_kelly, self.max_kelly)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoQuote,
    MarketData(String),
    AlreadyOpen,
    WideSpread { spread_pct: f64 },
    InsufficientHistory { points: usize, required: usize },
    NoSignal { composite: f64 },
    InsufficientEdge { net_ev: f64 },
    Rejected(Rejection),
    SizeTooSmall,
    ExecutionFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoQuote => f.write_str("no quote"),
            SkipReason::MarketData(reason) => write!(f, "market data error: {reason}"),
            SkipReason::AlreadyOpen => f.write_str("position already open"),
            SkipReason::WideSpread { spread_pct } => {
                write!(f, "spread too wide: {spread_pct:.1}%")
            }
            SkipReason::InsufficientHistory { points, required } => {
                write!(f, "insufficient history: {points} of {required} points")
            }
            SkipReason::NoSignal { composite } => write!(f, "no signal (composite {composite:+.2})"),
            SkipReason::InsufficientEdge { net_ev } => write!(f, "net EV too low: {net_ev:.3}"),
            SkipReason::Rejected(rejection) => write!(f, "risk check failed: {rejection}"),
            SkipReason::SizeTooSmall => f.write_str("position size too small"),
            SkipReason::ExecutionFailed(reason) => write!(f, "order failed: {reason}"),
        }
    }
}

/// A market that passed every gate, with its computed order.
#[derive(Debug, Clone, PartialEq)]
pub struct TradePlan {
    pub key: String,
    pub market_id: String,
    pub title: String,
    pub category: String,
    pub side: Side,
    /// Ask for buys, bid for sells.
    pub price: f64,
    pub mid: f64,
    pub spread_pct: f64,
    pub size: f64,
    pub shares: f64,
    pub signal: Signal,
    pub edge: EdgeEvaluation,
}

impl TradePlan {
    pub fn order(&self) -> OrderRequest {
        OrderRequest {
            key: self.key.clone(),
            side: self.side,
            price: self.price,
            shares: self.shares,
        }
    }

    pub fn open_request(&self, entry_price: f64) -> OpenRequest {
        OpenRequest {
            key: self.key.clone(),
            market_id: self.market_id.clone(),
            title: self.title.clone(),
            category: self.category.clone(),
            side: self.side,
            entry_price,
            size: self.size,
            shares: self.shares,
        }
    }
}

impl fmt::Display for TradePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] @ {:.4} size {:.2} ({:.2} shares) conf {:.0}% net EV {:.3}",
            self.signal.kind,
            self.title,
            self.category,
            self.price,
            self.size,
            self.shares,
            self.signal.confidence * 100.0,
            self.edge.net_ev
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Skipped(SkipReason),
    Candidate(Box<TradePlan>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettledExit {
    pub key: String,
    pub reason: ExitReason,
    pub price: f64,
    pub pnl: f64,
    pub order_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleReport {
    pub exits: Vec<SettledExit>,
    /// Why the scan for new positions did not run, if it did not.
    pub halted: Option<Rejection>,
    pub evaluations: Vec<(String, Evaluation)>,
    pub opened: Option<Position>,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for exit in &self.exits {
            writeln!(
                f,
                "EXIT {} {} @ {:.4} pnl {:+.4}",
                exit.key, exit.reason, exit.price, exit.pnl
            )?;
        }
        if let Some(halt) = &self.halted {
            writeln!(f, "scan halted: {halt}")?;
        }
        for (key, evaluation) in &self.evaluations {
            match evaluation {
                Evaluation::Skipped(reason) => writeln!(f, "SKIP {key}: {reason}")?,
                Evaluation::Candidate(plan) => writeln!(f, "CANDIDATE {key}: {plan}")?,
            }
        }
        match &self.opened {
            Some(pos) => write!(
                f,
                "OPENED {} {} @ {:.4} size {:.2}",
                pos.side, pos.key, pos.entry_price, pos.size
            ),
            None => write!(f, "no position opened"),
        }
    }
}

pub struct TradingCycle<'a> {
    config: &'a CycleConfig,
    market_data: &'a dyn MarketDataPort,
    venue: &'a mut dyn ExecutionPort,
}

impl<'a> TradingCycle<'a> {
    pub fn new(
        config: &'a CycleConfig,
        market_data: &'a dyn MarketDataPort,
        venue: &'a mut dyn ExecutionPort,
    ) -> Self {
        TradingCycle {
            config,
            market_data,
            venue,
        }
    }

    /// Exits first, then at most one new position from `candidates`, in order.
    pub fn run(
        &mut self,
        ledger: &mut RiskLedger,
        candidates: &[String],
        recent: &TradeStats,
    ) -> Result<CycleReport, TraderError> {
        ledger.refresh()?;
        let mut report = CycleReport {
            exits: self.process_exits(ledger)?,
            ..CycleReport::default()
        };

        if let Some(until) = ledger.cooldown_until() {
            info!(until = %until, "in cooldown, skipping market scan");
            report.halted = Some(Rejection::Cooldown { until });
            return Ok(report);
        }
        let max = ledger.config().max_positions;
        if ledger.position_count() >= max {
            info!(max, "max positions reached, waiting for exits");
            report.halted = Some(Rejection::MaxPositions { max });
            return Ok(report);
        }

        let kelly = self.config.kelly_for(recent);
        for key in candidates {
            if ledger.position(key).is_some() {
                report
                    .evaluations
                    .push((key.clone(), Evaluation::Skipped(SkipReason::AlreadyOpen)));
                continue;
            }

            let plan = match self.evaluate(ledger, key, kelly)? {
                Evaluation::Candidate(plan) => plan,
                skipped => {
                    report.evaluations.push((key.clone(), skipped));
                    continue;
                }
            };

            match self.venue.submit(&plan.order()) {
                Ok(ack) => {
                    let entry = if ack.filled_price > 0.0 {
                        ack.filled_price
                    } else {
                        plan.price
                    };
                    info!(key = %plan.key, order_id = %ack.order_id, %plan, "order filled");
                    let position = ledger.open(plan.open_request(entry))?;
                    report
                        .evaluations
                        .push((key.clone(), Evaluation::Candidate(plan)));
                    report.opened = Some(position);
                    break;
                }
                Err(e) => {
                    warn!(key = %plan.key, error = %e, "entry order failed");
                    report.evaluations.push((
                        key.clone(),
                        Evaluation::Skipped(SkipReason::ExecutionFailed(e.to_string())),
                    ));
                }
            }
        }
        Ok(report)
    }

    /// Prices every open position, settles the ones whose exit triggered and returns them.
    /// A failed exit order is logged and the ledger settles regardless.
    pub fn process_exits(
        &mut self,
        ledger: &mut RiskLedger,
    ) -> Result<Vec<SettledExit>, TraderError> {
        let keys: Vec<String> = ledger.positions().map(|p| p.key.clone()).collect();
        let mut prices = HashMap::new();
        for key in keys {
            match self.market_data.current_price(&key) {
                Ok(Some(price)) if price > 0.0 => {
                    prices.insert(key, price);
                }
                Ok(_) => debug!(key = %key, "no price for open position"),
                Err(e) => warn!(key = %key, error = %e, "failed to price open position"),
            }
        }

        let mut settled = Vec::new();
        for signal in ledger.check_exits(&prices) {
            let Some(position) = ledger.position(&signal.key) else {
                continue;
            };
            let order = OrderRequest {
                key: signal.key.clone(),
                side: position.side.opposite(),
                price: signal.price,
                shares: position.shares,
            };
            let order_failed = match self.venue.submit(&order) {
                Ok(_) => false,
                Err(e) => {
                    warn!(key = %signal.key, error = %e, "exit order failed, settling anyway");
                    true
                }
            };
            let pnl = ledger.close(&signal.key, signal.price, signal.reason)?;
            settled.push(SettledExit {
                key: signal.key,
                reason: signal.reason,
                price: signal.price,
                pnl,
                order_failed,
            });
        }
        Ok(settled)
    }

    /// Runs one market through every gate: quote, spread, history, signal, edge, risk, size.
    pub fn evaluate(
        &self,
        ledger: &mut RiskLedger,
        key: &str,
        kelly: f64,
    ) -> Result<Evaluation, TraderError> {
        let quote = match self.market_data.quote(key) {
            Ok(Some(quote)) => quote,
            Ok(None) => return Ok(skip(key, SkipReason::NoQuote)),
            Err(e) => {
                warn!(key, error = %e, "market data unavailable");
                return Ok(skip(key, SkipReason::MarketData(e.to_string())));
            }
        };

        let spread = spread_pct(quote.best_bid, quote.best_ask);
        if spread > self.config.signal.max_spread_pct {
            return Ok(skip(key, SkipReason::WideSpread { spread_pct: spread }));
        }
        if quote.history.len() < self.config.min_history {
            return Ok(skip(
                key,
                SkipReason::InsufficientHistory {
                    points: quote.history.len(),
                    required: self.config.min_history,
                },
            ));
        }

        let mid = mid_price(quote.best_bid, quote.best_ask);
        let z = z_score(mid, &quote.history);
        let signal = compose_signal(mid, &quote.history, z, spread, &self.config.signal);
        let (Some(side), Some(indicators)) = (signal.kind.side(), signal.indicators.as_ref())
        else {
            return Ok(skip(
                key,
                SkipReason::NoSignal {
                    composite: signal.composite,
                },
            ));
        };
        debug!(key, kind = %signal.kind, %indicators, "signal");

        let edge = EdgeEvaluation::evaluate(mid, indicators.sma, side, spread, &self.config.costs);
        if !edge.is_admissible(&self.config.costs) {
            return Ok(skip(key, SkipReason::InsufficientEdge { net_ev: edge.net_ev }));
        }

        let category = ledger.categorize(&quote.title).to_string();
        if let OpenCheck::Rejected(rejection) = ledger.can_open(key, &category)? {
            return Ok(skip(key, SkipReason::Rejected(rejection)));
        }

        let price = match side {
            Side::Buy => quote.best_ask,
            Side::Sell => quote.best_bid,
        };
        let streak = ledger.streak();
        let limits = ledger.config();
        let size = position_size(&SizingInput {
            balance: ledger.balance(),
            base_pct: self.config.base_pct,
            win_streak: streak.wins,
            lose_streak: streak.losses,
            confidence: signal.confidence,
            kelly_fraction: kelly,
            min_size: limits.min_trade_size,
            max_size: limits.max_trade_size,
        });
        if size <= 0.0 || price <= 0.0 {
            return Ok(skip(key, SkipReason::SizeTooSmall));
        }

        let plan = TradePlan {
            key: key.to_string(),
            market_id: quote.market_id,
            title: quote.title,
            category,
            side,
            price,
            mid,
            spread_pct: spread,
            size,
            shares: size / price,
            signal,
            edge,
        };
        info!(key, %plan, "trade candidate");
        Ok(Evaluation::Candidate(Box::new(plan)))
    }
}

fn skip(key: &str, reason: SkipReason) -> Evaluation {
    debug!(key, %reason, "market skipped");
    Evaluation::Skipped(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalKind;
    use approx::assert_relative_eq;

    fn plan(side: Side) -> TradePlan {
        TradePlan {
            key: "tok".into(),
            market_id: "cond-tok".into(),
            title: "Will Bitcoin hit 100k?".into(),
            category: "crypto".into(),
            side,
            price: 0.405,
            mid: 0.40,
            spread_pct: 2.5,
            size: 0.5,
            shares: 0.5 / 0.405,
            signal: Signal {
                kind: SignalKind::StrongBuy,
                confidence: 0.75,
                composite: -0.75,
                indicators: None,
            },
            edge: EdgeEvaluation {
                expected_edge: 0.2,
                effective_cost: 0.02,
                net_ev: 0.18,
            },
        }
    }

    #[test]
    fn plan_order_matches_plan() {
        let order = plan(Side::Buy).order();
        assert_eq!(order.key, "tok");
        assert_eq!(order.side, Side::Buy);
        assert_relative_eq!(order.price, 0.405);
        assert_relative_eq!(order.shares, 0.5 / 0.405);
    }

    #[test]
    fn open_request_uses_fill_price() {
        let req = plan(Side::Sell).open_request(0.41);
        assert_eq!(req.side, Side::Sell);
        assert_eq!(req.category, "crypto");
        assert_relative_eq!(req.entry_price, 0.41);
        assert_relative_eq!(req.size, 0.5);
    }

    #[test]
    fn kelly_falls_back_until_enough_trades() {
        let config = CycleConfig::default();
        assert_relative_eq!(config.kelly_for(&TradeStats::default()), 0.05);
    }

    #[test]
    fn skip_reasons_read_well() {
        assert_eq!(
            SkipReason::InsufficientHistory {
                points: 3,
                required: 5
            }
            .to_string(),
            "insufficient history: 3 of 5 points"
        );
        assert_eq!(
            SkipReason::WideSpread { spread_pct: 12.34 }.to_string(),
            "spread too wide: 12.3%"
        );
        assert_eq!(
            SkipReason::Rejected(Rejection::MaxPositions { max: 3 }).to_string(),
            "risk check failed: max positions (3) reached"
        );
    }

    #[test]
    fn report_lists_exits_and_outcome() {
        let report = CycleReport {
            exits: vec![SettledExit {
                key: "old".into(),
                reason: ExitReason::TakeProfit,
                price: 0.6,
                pnl: 0.1,
                order_failed: false,
            }],
            halted: None,
            evaluations: vec![("tok".into(), Evaluation::Skipped(SkipReason::NoQuote))],
            opened: None,
        };
        let text = report.to_string();
        assert!(text.contains("EXIT old TAKE_PROFIT @ 0.6000 pnl +0.1000"));
        assert!(text.contains("SKIP tok: no quote"));
        assert!(text.ends_with("no position opened"));
    }
}
