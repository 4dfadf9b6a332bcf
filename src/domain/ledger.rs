//! Risk ledger: open positions, balance, daily P&L, cooldown and streaks.
//!
//! The ledger is the only persisted state in the engine. Every mutation that changes what a
//! restart would see (open, close, cooldown trigger or expiry, daily reset) writes a complete
//! `Snapshot` through the `SnapshotPort`. Policy refusals are values (`OpenCheck`), and only
//! storage failures surface as `TraderError`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

use super::category::CategoryTable;
use super::error::TraderError;
use super::position::{ClosedTrade, ExitReason, ExitRules, OpenRequest, Position, Side};
use super::sizing::StreakTracker;
use crate::ports::clock_port::Clock;
use crate::ports::journal_port::JournalPort;
use crate::ports::notification_port::NotificationPort;
use crate::ports::snapshot_port::SnapshotPort;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub initial_balance: f64,
    pub max_positions: usize,
    pub min_trade_size: f64,
    pub max_trade_size: f64,
    pub exit_rules: ExitRules,
    /// Fraction of the day's starting balance that may be lost before the cooldown starts.
    pub max_daily_loss_pct: f64,
    pub cooldown_hours: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            initial_balance: 10.0,
            max_positions: 3,
            min_trade_size: 0.30,
            max_trade_size: 0.50,
            exit_rules: ExitRules::default(),
            max_daily_loss_pct: 0.02,
            cooldown_hours: 24,
        }
    }
}

/// Complete persisted image of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub balance: f64,
    pub initial_balance: f64,
    pub daily_pnl: f64,
    pub daily_start_balance: f64,
    pub last_reset_date: NaiveDate,
    pub cooldown_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub streak: StreakTracker,
    pub positions: BTreeMap<String, Position>,
}

impl Snapshot {
    pub fn fresh(initial_balance: f64, today: NaiveDate) -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            balance: initial_balance,
            initial_balance,
            daily_pnl: 0.0,
            daily_start_balance: initial_balance,
            last_reset_date: today,
            cooldown_until: None,
            streak: StreakTracker::default(),
            positions: BTreeMap::new(),
        }
    }

    pub fn exposure(&self) -> f64 {
        self.positions.values().map(|p| p.size).sum()
    }
}

/// Collaborators injected into the ledger.
pub struct LedgerPorts {
    pub store: Box<dyn SnapshotPort>,
    pub journal: Box<dyn JournalPort>,
    pub notifier: Box<dyn NotificationPort>,
    pub clock: Box<dyn Clock>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Cooldown { until: DateTime<Utc> },
    MaxPositions { max: usize },
    DuplicateKey,
    CategoryTaken { category: String },
    InsufficientBalance { balance: f64, minimum: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Cooldown { until } => {
                write!(f, "in cooldown until {}", until.format("%Y-%m-%d %H:%M UTC"))
            }
            Rejection::MaxPositions { max } => write!(f, "max positions ({max}) reached"),
            Rejection::DuplicateKey => f.write_str("position already open for this market"),
            Rejection::CategoryTaken { category } => {
                write!(f, "already holding a position in category '{category}'")
            }
            Rejection::InsufficientBalance { balance, minimum } => {
                write!(f, "balance {balance:.2} below minimum trade size {minimum:.2}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenCheck {
    Allowed,
    Rejected(Rejection),
}

impl OpenCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, OpenCheck::Allowed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitSignal {
    pub key: String,
    pub reason: ExitReason,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    PositionOpened {
        key: String,
        title: String,
        category: String,
        side: Side,
        price: f64,
        size: f64,
    },
    PositionClosed {
        key: String,
        title: String,
        side: Side,
        exit_price: f64,
        pnl: f64,
        reason: ExitReason,
    },
    CooldownStarted {
        daily_pnl: f64,
        until: DateTime<Utc>,
    },
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEvent::PositionOpened {
                title,
                category,
                side,
                price,
                size,
                ..
            } => write!(
                f,
                "OPENED {side} {title} [{category}] @ {price:.4} size {size:.2}"
            ),
            LedgerEvent::PositionClosed {
                title,
                side,
                exit_price,
                pnl,
                reason,
                ..
            } => write!(
                f,
                "CLOSED {side} {title} @ {exit_price:.4} pnl {pnl:+.4} ({reason})"
            ),
            LedgerEvent::CooldownStarted { daily_pnl, until } => write!(
                f,
                "COOLDOWN daily pnl {daily_pnl:+.4}, trading paused until {}",
                until.format("%Y-%m-%d %H:%M UTC")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStatus {
    pub balance: f64,
    pub initial_balance: f64,
    /// Realised P&L: balance plus capital still committed to open positions, less the start.
    pub total_pnl: f64,
    pub total_pnl_pct: f64,
    pub daily_pnl: f64,
    pub daily_loss_limit: f64,
    pub daily_loss_remaining: f64,
    pub open_positions: usize,
    pub max_positions: usize,
    pub exposure: f64,
    pub cooldown_remaining: Option<Duration>,
    pub win_streak: u32,
    pub lose_streak: u32,
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Balance: {:.4} (initial {:.2})",
            self.balance, self.initial_balance
        )?;
        writeln!(
            f,
            "Total P&L: {:+.4} ({:+.2}%)",
            self.total_pnl, self.total_pnl_pct
        )?;
        writeln!(
            f,
            "Daily P&L: {:+.4} (limit -{:.4}, headroom {:.4})",
            self.daily_pnl, self.daily_loss_limit, self.daily_loss_remaining
        )?;
        writeln!(
            f,
            "Positions: {}/{} exposure {:.4}",
            self.open_positions, self.max_positions, self.exposure
        )?;
        writeln!(
            f,
            "Streak: {} wins / {} losses",
            self.win_streak, self.lose_streak
        )?;
        match self.cooldown_remaining {
            Some(left) => write!(
                f,
                "Cooldown: {}h {:02}m remaining",
                left.num_hours(),
                left.num_minutes() % 60
            ),
            None => write!(f, "Cooldown: inactive"),
        }
    }
}

pub struct RiskLedger {
    config: RiskConfig,
    categories: CategoryTable,
    ports: LedgerPorts,
    state: Snapshot,
}

impl RiskLedger {
    /// Fresh ledger at the configured initial balance. Nothing is persisted until the first
    /// state change.
    pub fn new(config: RiskConfig, categories: CategoryTable, ports: LedgerPorts) -> Self {
        let today = ports.clock.now().date_naive();
        let state = Snapshot::fresh(config.initial_balance, today);
        RiskLedger {
            config,
            categories,
            ports,
            state,
        }
    }

    /// Loads the stored snapshot, or starts fresh when the store is empty.
    pub fn restore(
        config: RiskConfig,
        categories: CategoryTable,
        ports: LedgerPorts,
    ) -> Result<Self, TraderError> {
        let Some(snapshot) = ports.store.load()? else {
            info!(
                balance = config.initial_balance,
                "no snapshot found, starting fresh ledger"
            );
            return Ok(RiskLedger::new(config, categories, ports));
        };

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(TraderError::SnapshotVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        info!(
            balance = snapshot.balance,
            positions = snapshot.positions.len(),
            last_reset = %snapshot.last_reset_date,
            "ledger restored from snapshot"
        );
        Ok(RiskLedger {
            config,
            categories,
            ports,
            state: Snapshot {
                version: SNAPSHOT_VERSION,
                ..snapshot
            },
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn balance(&self) -> f64 {
        self.state.balance
    }

    pub fn daily_pnl(&self) -> f64 {
        self.state.daily_pnl
    }

    pub fn streak(&self) -> StreakTracker {
        self.state.streak
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.state.cooldown_until
    }

    pub fn position(&self, key: &str) -> Option<&Position> {
        self.state.positions.get(key)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.state.positions.values()
    }

    pub fn position_count(&self) -> usize {
        self.state.positions.len()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.ports.clock.now()
    }

    pub fn categorize(&self, title: &str) -> &str {
        self.categories.classify(title)
    }

    /// Applies the daily rollover and cooldown expiry, persisting if either fired.
    pub fn refresh(&mut self) -> Result<(), TraderError> {
        let now = self.ports.clock.now();
        let mut dirty = false;

        let today = now.date_naive();
        if today != self.state.last_reset_date {
            info!(
                previous = %self.state.last_reset_date,
                today = %today,
                daily_pnl = self.state.daily_pnl,
                balance = self.state.balance,
                "daily reset"
            );
            self.state.daily_pnl = 0.0;
            self.state.daily_start_balance = self.state.balance;
            self.state.last_reset_date = today;
            dirty = true;
        }

        if let Some(until) = self.state.cooldown_until {
            if now >= until {
                info!(until = %until, "cooldown expired");
                self.state.cooldown_until = None;
                dirty = true;
            }
        }

        if dirty {
            self.persist()?;
        }
        Ok(())
    }

    pub fn can_open(&mut self, key: &str, category: &str) -> Result<OpenCheck, TraderError> {
        self.refresh()?;

        if let Some(until) = self.state.cooldown_until {
            return Ok(OpenCheck::Rejected(Rejection::Cooldown { until }));
        }
        if self.state.positions.len() >= self.config.max_positions {
            return Ok(OpenCheck::Rejected(Rejection::MaxPositions {
                max: self.config.max_positions,
            }));
        }
        if self.state.positions.contains_key(key) {
            return Ok(OpenCheck::Rejected(Rejection::DuplicateKey));
        }
        if self.state.positions.values().any(|p| p.category == category) {
            return Ok(OpenCheck::Rejected(Rejection::CategoryTaken {
                category: category.to_string(),
            }));
        }
        if self.state.balance < self.config.min_trade_size {
            return Ok(OpenCheck::Rejected(Rejection::InsufficientBalance {
                balance: self.state.balance,
                minimum: self.config.min_trade_size,
            }));
        }
        Ok(OpenCheck::Allowed)
    }

    /// Registers a new position and debits its size. Policy checks are the caller's job via
    /// `can_open`; only a duplicate key is refused here.
    pub fn open(&mut self, request: OpenRequest) -> Result<Position, TraderError> {
        self.refresh()?;
        if self.state.positions.contains_key(&request.key) {
            return Err(TraderError::DuplicatePosition { key: request.key });
        }

        let now = self.ports.clock.now();
        let position = Position::open(request, &self.config.exit_rules, now);
        self.state.balance -= position.size;
        self.state
            .positions
            .insert(position.key.clone(), position.clone());

        info!(
            key = %position.key,
            side = %position.side,
            category = %position.category,
            price = position.entry_price,
            size = position.size,
            stop_loss = position.stop_loss,
            take_profit = position.take_profit,
            balance = self.state.balance,
            "position opened"
        );

        self.persist()?;
        self.emit(LedgerEvent::PositionOpened {
            key: position.key.clone(),
            title: position.title.clone(),
            category: position.category.clone(),
            side: position.side,
            price: position.entry_price,
            size: position.size,
        });
        Ok(position)
    }

    /// Updates high-water marks and reports which positions should exit. Positions missing from
    /// `prices` are skipped. Nothing is persisted here; updated marks ride along with the next save.
    ///
    /// Does not roll the trading day over. Callers run `refresh` first, as `TradingCycle::run` does.
    pub fn check_exits(&mut self, prices: &HashMap<String, f64>) -> Vec<ExitSignal> {
        let mut exits = Vec::new();
        for (key, position) in self.state.positions.iter_mut() {
            let Some(&price) = prices.get(key) else {
                continue;
            };
            position.on_price_update(price);
            if let Some(reason) = position.evaluate_exit(price) {
                debug!(key = %key, price, %reason, "exit triggered");
                exits.push(ExitSignal {
                    key: key.clone(),
                    reason,
                    price,
                });
            }
        }
        exits
    }

    /// Settles a position at `exit_price` and returns its P&L. Closing a key that is not open
    /// is a no-op returning 0.
    pub fn close(
        &mut self,
        key: &str,
        exit_price: f64,
        reason: ExitReason,
    ) -> Result<f64, TraderError> {
        self.refresh()?;
        let Some(position) = self.state.positions.remove(key) else {
            debug!(key, "close requested for unknown position");
            return Ok(0.0);
        };

        let now = self.ports.clock.now();
        let trade = position.settle(exit_price, reason, now);
        self.state.balance += position.size + trade.pnl;
        self.state.daily_pnl += trade.pnl;
        self.state.streak.record(trade.pnl);

        info!(
            key,
            side = %position.side,
            entry = position.entry_price,
            exit = exit_price,
            pnl = trade.pnl,
            %reason,
            balance = self.state.balance,
            daily_pnl = self.state.daily_pnl,
            "position closed"
        );

        self.record_trade(&trade);
        self.emit(LedgerEvent::PositionClosed {
            key: trade.key.clone(),
            title: trade.title.clone(),
            side: trade.side,
            exit_price,
            pnl: trade.pnl,
            reason,
        });

        let limit = self.daily_loss_limit();
        if self.state.daily_pnl < -limit {
            let until = Duration::try_hours(self.config.cooldown_hours)
                .and_then(|span| now.checked_add_signed(span))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.state.cooldown_until = Some(until);
            warn!(
                daily_pnl = self.state.daily_pnl,
                limit,
                until = %until,
                "daily loss limit breached, cooldown started"
            );
            self.emit(LedgerEvent::CooldownStarted {
                daily_pnl: self.state.daily_pnl,
                until,
            });
        }

        self.persist()?;
        Ok(trade.pnl)
    }

    pub fn daily_loss_limit(&self) -> f64 {
        self.state.daily_start_balance * self.config.max_daily_loss_pct
    }

    pub fn status(&self) -> LedgerStatus {
        let now = self.ports.clock.now();
        let exposure = self.state.exposure();
        let initial = self.state.initial_balance;
        let total_pnl = self.state.balance + exposure - initial;
        let limit = self.daily_loss_limit();
        LedgerStatus {
            balance: self.state.balance,
            initial_balance: initial,
            total_pnl,
            total_pnl_pct: if initial > 0.0 {
                total_pnl / initial * 100.0
            } else {
                0.0
            },
            daily_pnl: self.state.daily_pnl,
            daily_loss_limit: limit,
            daily_loss_remaining: (limit + self.state.daily_pnl).max(0.0),
            open_positions: self.state.positions.len(),
            max_positions: self.config.max_positions,
            exposure,
            cooldown_remaining: self
                .state
                .cooldown_until
                .filter(|until| *until > now)
                .map(|until| until - now),
            win_streak: self.state.streak.wins,
            lose_streak: self.state.streak.losses,
        }
    }

    fn persist(&mut self) -> Result<(), TraderError> {
        self.ports.store.save(&self.state)?;
        debug!(
            balance = self.state.balance,
            positions = self.state.positions.len(),
            "snapshot saved"
        );
        Ok(())
    }

    fn record_trade(&mut self, trade: &ClosedTrade) {
        if let Err(e) = self.ports.journal.append(trade) {
            warn!(key = %trade.key, error = %e, "failed to journal closed trade");
        }
    }

    fn emit(&mut self, event: LedgerEvent) {
        if let Err(e) = self.ports.notifier.notify(&event) {
            warn!(error = %e, "notification failed");
        }
    }
}
