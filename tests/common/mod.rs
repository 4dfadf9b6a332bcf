#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use probtrader::domain::category::CategoryTable;
use probtrader::domain::error::TraderError;
use probtrader::domain::ledger::{LedgerEvent, LedgerPorts, RiskConfig, RiskLedger, Snapshot};
use probtrader::domain::position::{ClosedTrade, ExitReason, Side};
use probtrader::ports::clock_port::Clock;
use probtrader::ports::execution_port::{ExecutionPort, OrderAck, OrderRequest};
use probtrader::ports::journal_port::JournalPort;
use probtrader::ports::market_data_port::{MarketDataPort, MarketQuote};
use probtrader::ports::notification_port::NotificationPort;
use probtrader::ports::snapshot_port::SnapshotPort;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

// --- clock ---

#[derive(Clone)]
pub struct MockClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl MockClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

// --- snapshot store ---

#[derive(Clone, Default)]
pub struct SharedStore {
    pub saved: Rc<RefCell<Option<Snapshot>>>,
    pub saves: Rc<Cell<usize>>,
    pub fail_saves: Rc<Cell<bool>>,
}

impl SharedStore {
    pub fn latest(&self) -> Option<Snapshot> {
        self.saved.borrow().clone()
    }
}

impl SnapshotPort for SharedStore {
    fn load(&self) -> Result<Option<Snapshot>, TraderError> {
        Ok(self.saved.borrow().clone())
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), TraderError> {
        if self.fail_saves.get() {
            return Err(TraderError::Persistence {
                reason: "disk full".into(),
            });
        }
        *self.saved.borrow_mut() = Some(snapshot.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

// --- journal ---

#[derive(Clone, Default)]
pub struct SharedJournal {
    pub trades: Rc<RefCell<Vec<ClosedTrade>>>,
    pub fail: Rc<Cell<bool>>,
}

impl SharedJournal {
    pub fn trades(&self) -> Vec<ClosedTrade> {
        self.trades.borrow().clone()
    }
}

impl JournalPort for SharedJournal {
    fn append(&mut self, trade: &ClosedTrade) -> Result<(), TraderError> {
        if self.fail.get() {
            return Err(TraderError::Journal {
                reason: "journal unavailable".into(),
            });
        }
        self.trades.borrow_mut().push(trade.clone());
        Ok(())
    }
}

// --- notifier ---

#[derive(Clone, Default)]
pub struct SharedNotifier {
    pub events: Rc<RefCell<Vec<LedgerEvent>>>,
    pub fail: Rc<Cell<bool>>,
}

impl SharedNotifier {
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.borrow().clone()
    }

    pub fn cooldowns(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, LedgerEvent::CooldownStarted { .. }))
            .count()
    }
}

impl NotificationPort for SharedNotifier {
    fn notify(&mut self, event: &LedgerEvent) -> Result<(), TraderError> {
        if self.fail.get() {
            return Err(TraderError::Execution {
                key: "notify".into(),
                reason: "webhook down".into(),
            });
        }
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}

// --- ledger harness ---

/// Shared handles to every ledger collaborator, so tests can inspect them after the ledger
/// has taken ownership of its boxed ports.
#[derive(Clone)]
pub struct Harness {
    pub store: SharedStore,
    pub journal: SharedJournal,
    pub notifier: SharedNotifier,
    pub clock: MockClock,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: SharedStore::default(),
            journal: SharedJournal::default(),
            notifier: SharedNotifier::default(),
            clock: MockClock::at(t0()),
        }
    }

    pub fn ports(&self) -> LedgerPorts {
        LedgerPorts {
            store: Box::new(self.store.clone()),
            journal: Box::new(self.journal.clone()),
            notifier: Box::new(self.notifier.clone()),
            clock: Box::new(self.clock.clone()),
        }
    }

    pub fn ledger(&self, config: RiskConfig) -> RiskLedger {
        RiskLedger::restore(config, CategoryTable::default(), self.ports()).unwrap()
    }

    pub fn default_ledger(&self) -> RiskLedger {
        self.ledger(RiskConfig::default())
    }
}

// --- market data ---

#[derive(Default)]
pub struct MockMarketData {
    quotes: RefCell<HashMap<String, MarketQuote>>,
    errors: HashMap<String, String>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(self, quote: MarketQuote) -> Self {
        self.quotes.borrow_mut().insert(quote.key.clone(), quote);
        self
    }

    pub fn with_error(mut self, key: &str, reason: &str) -> Self {
        self.errors.insert(key.to_string(), reason.to_string());
        self
    }

    /// Moves the book so its mid is `price`, keeping a one-cent spread.
    pub fn set_price(&self, key: &str, price: f64) {
        if let Some(quote) = self.quotes.borrow_mut().get_mut(key) {
            quote.price = price;
            quote.best_bid = price - 0.005;
            quote.best_ask = price + 0.005;
        }
    }

    pub fn remove(&self, key: &str) {
        self.quotes.borrow_mut().remove(key);
    }
}

impl MarketDataPort for MockMarketData {
    fn quote(&self, key: &str) -> Result<Option<MarketQuote>, TraderError> {
        if let Some(reason) = self.errors.get(key) {
            return Err(TraderError::MarketData {
                key: key.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.quotes.borrow().get(key).cloned())
    }
}

pub fn quote(key: &str, title: &str, bid: f64, ask: f64, history: Vec<f64>) -> MarketQuote {
    MarketQuote {
        key: key.to_string(),
        market_id: format!("cond-{key}"),
        title: title.to_string(),
        price: (bid + ask) / 2.0,
        history,
        best_bid: bid,
        best_ask: ask,
    }
}

/// Nineteen points oscillating around 0.51 followed by a sharp drop to 0.40: deeply oversold
/// on z-score and below the lower band, which composes to a strong buy with ~0.20 edge.
pub fn oversold_history() -> Vec<f64> {
    let mut history: Vec<f64> = (0..19)
        .map(|i| if i % 2 == 0 { 0.50 } else { 0.52 })
        .collect();
    history.push(0.40);
    history
}

/// A market whose book sits at 0.395/0.405 after an oversold drop.
pub fn oversold_quote(key: &str, title: &str) -> MarketQuote {
    quote(key, title, 0.395, 0.405, oversold_history())
}

/// Twenty identical points: zero z-score, neutral RSI and band, no signal.
pub fn flat_quote(key: &str, title: &str) -> MarketQuote {
    quote(key, title, 0.495, 0.505, vec![0.50; 20])
}

// --- venue ---

#[derive(Clone, Default)]
pub struct MockVenue {
    pub orders: Rc<RefCell<Vec<OrderRequest>>>,
    pub failing: Rc<RefCell<HashSet<String>>>,
    pub fill_price: Rc<Cell<Option<f64>>>,
}

impl MockVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, key: &str) {
        self.failing.borrow_mut().insert(key.to_string());
    }

    pub fn recover(&self, key: &str) {
        self.failing.borrow_mut().remove(key);
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.borrow().clone()
    }
}

impl ExecutionPort for MockVenue {
    fn submit(&mut self, order: &OrderRequest) -> Result<OrderAck, TraderError> {
        if self.failing.borrow().contains(&order.key) {
            return Err(TraderError::Execution {
                key: order.key.clone(),
                reason: "order rejected".into(),
            });
        }
        self.orders.borrow_mut().push(order.clone());
        Ok(OrderAck {
            order_id: format!("mock-{}", self.orders.borrow().len()),
            filled_price: self.fill_price.get().unwrap_or(0.0),
        })
    }
}

// --- trades ---

pub fn closed_trade(key: &str, category: &str, pnl: f64, exit_time: DateTime<Utc>) -> ClosedTrade {
    ClosedTrade {
        exit_time,
        key: key.to_string(),
        market_id: format!("cond-{key}"),
        title: key.to_string(),
        category: category.to_string(),
        side: Side::Buy,
        entry_price: 0.40,
        exit_price: 0.40 + pnl,
        size: 0.40,
        shares: 1.0,
        pnl,
        exit_reason: if pnl >= 0.0 {
            ExitReason::TakeProfit
        } else {
            ExitReason::StopLoss
        },
        hold_minutes: 30.0,
    }
}
