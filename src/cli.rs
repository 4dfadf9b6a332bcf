//! CLI definition, config builders and command dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, warn};

use crate::adapters::csv_journal_adapter::CsvJournalAdapter;
use crate::adapters::csv_market_data_adapter::CsvMarketDataAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_snapshot_adapter::JsonSnapshotAdapter;
use crate::adapters::log_notifier::{LogNotifier, NullNotifier};
use crate::adapters::memory_snapshot_adapter::MemorySnapshotAdapter;
use crate::adapters::paper_venue::PaperVenue;
use crate::domain::category::CategoryTable;
use crate::domain::config_validation::validate_config;
use crate::domain::cycle::{CycleConfig, Evaluation, TradingCycle};
use crate::domain::edge::CostModel;
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::ledger::{LedgerPorts, RiskConfig, RiskLedger};
use crate::domain::position::{ExitReason, ExitRules};
use crate::domain::signal::SignalConfig;
use crate::domain::stats::{by_category, by_exit_reason, suggestions, TradeStats};
use crate::ports::clock_port::{Clock, SystemClock};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::notification_port::NotificationPort;
use crate::ports::snapshot_port::SnapshotPort;

pub const DEFAULT_SNAPSHOT_PATH: &str = "ledger.json";
pub const DEFAULT_JOURNAL_PATH: &str = "trades.csv";
pub const DEFAULT_MARKET_DATA_PATH: &str = "data";

#[derive(Parser, Debug)]
#[command(
    name = "probtrader",
    about = "Signal and risk engine for probability markets"
)]
pub struct Cli {
    /// INI config file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show balance, daily P&L, cooldown and open positions
    Status,
    /// Validate the configuration
    Validate,
    /// Run one market through every entry gate without trading
    Evaluate {
        #[arg(long)]
        market: String,
    },
    /// Run one paper trading cycle
    Cycle {
        /// Comma-separated market keys; defaults to every market in markets.csv
        #[arg(long, value_delimiter = ',')]
        markets: Vec<String>,
    },
    /// Manually close an open position
    Close {
        #[arg(long)]
        market: String,
        #[arg(long)]
        price: f64,
    },
    /// Summarise closed trades
    Report {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, TraderError> {
    match path {
        Some(path) => FileConfigAdapter::from_file(path),
        None => FileConfigAdapter::from_string(""),
    }
}

pub fn run(cli: &Cli, config: &dyn ConfigPort) -> ExitCode {
    let result = match &cli.command {
        Command::Status => run_status(config),
        Command::Validate => run_validate(config),
        Command::Evaluate { market } => run_evaluate(config, market),
        Command::Cycle { markets } => run_cycle(config, markets),
        Command::Close { market, price } => run_close(config, market, *price),
        Command::Report { days } => run_report(config, *days),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::from(&err)
        }
    }
}

pub fn build_risk_config(adapter: &dyn ConfigPort) -> RiskConfig {
    let d = RiskConfig::default();
    let s = "ledger";
    RiskConfig {
        initial_balance: adapter.get_double(s, "initial_balance", d.initial_balance),
        max_positions: adapter.get_int(s, "max_positions", d.max_positions as i64) as usize,
        min_trade_size: adapter.get_double(s, "min_trade_size", d.min_trade_size),
        max_trade_size: adapter.get_double(s, "max_trade_size", d.max_trade_size),
        exit_rules: ExitRules {
            stop_loss_pct: adapter.get_double(s, "stop_loss", d.exit_rules.stop_loss_pct),
            take_profit_pct: adapter.get_double(s, "take_profit", d.exit_rules.take_profit_pct),
            trailing_stop_pct: adapter.get_double(
                s,
                "trailing_stop",
                d.exit_rules.trailing_stop_pct,
            ),
            trailing_activation_pct: adapter.get_double(
                s,
                "trailing_activation",
                d.exit_rules.trailing_activation_pct,
            ),
        },
        max_daily_loss_pct: adapter.get_double(s, "max_daily_loss", d.max_daily_loss_pct),
        cooldown_hours: adapter.get_int(s, "cooldown_hours", d.cooldown_hours),
    }
}

pub fn build_signal_config(adapter: &dyn ConfigPort) -> SignalConfig {
    let d = SignalConfig::default();
    let s = "signal";
    let period = |key: &str, default: usize| adapter.get_int(s, key, default as i64) as usize;
    let num = |key: &str, default: f64| adapter.get_double(s, key, default);
    SignalConfig {
        max_spread_pct: num("max_spread_pct", d.max_spread_pct),
        indicators: IndicatorParams {
            sma_period: period("sma_period", d.indicators.sma_period),
            volatility_period: period("volatility_period", d.indicators.volatility_period),
            bollinger_period: period("bollinger_period", d.indicators.bollinger_period),
            bollinger_mult: num("bollinger_mult", d.indicators.bollinger_mult),
            rsi_period: period("rsi_period", d.indicators.rsi_period),
        },
        strong_score: num("strong_score", d.strong_score),
        weak_score: num("weak_score", d.weak_score),
        z_strong: num("z_strong", d.z_strong),
        z_weak: num("z_weak", d.z_weak),
        rsi_strong_oversold: num("rsi_strong_oversold", d.rsi_strong_oversold),
        rsi_oversold: num("rsi_oversold", d.rsi_oversold),
        rsi_overbought: num("rsi_overbought", d.rsi_overbought),
        rsi_strong_overbought: num("rsi_strong_overbought", d.rsi_strong_overbought),
        band_low: num("band_low", d.band_low),
        band_high: num("band_high", d.band_high),
        z_weight: num("z_weight", d.z_weight),
        rsi_weight: num("rsi_weight", d.rsi_weight),
        band_weight: num("band_weight", d.band_weight),
        strong_threshold: num("strong_threshold", d.strong_threshold),
        threshold: num("threshold", d.threshold),
    }
}

pub fn build_cycle_config(adapter: &dyn ConfigPort) -> CycleConfig {
    let d = CycleConfig::default();
    CycleConfig {
        signal: build_signal_config(adapter),
        costs: CostModel {
            fee_rate: adapter.get_double("execution", "fee_rate", d.costs.fee_rate),
            slippage: adapter.get_double("execution", "slippage", d.costs.slippage),
            min_net_ev: adapter.get_double("execution", "min_net_ev", d.costs.min_net_ev),
        },
        min_history: adapter.get_int("signal", "min_history", d.min_history as i64) as usize,
        base_pct: adapter.get_double("sizing", "base_pct", d.base_pct),
        default_kelly: adapter.get_double("sizing", "default_kelly", d.default_kelly),
        max_kelly: adapter.get_double("sizing", "max_kelly", d.max_kelly),
        min_trades_for_kelly: adapter.get_int(
            "sizing",
            "min_trades_for_kelly",
            d.min_trades_for_kelly as i64,
        ) as usize,
        stats_days: adapter.get_int("sizing", "stats_days", i64::from(d.stats_days)) as u32,
    }
}

/// `[categories]` in file order, or the built-in buckets when the section is absent.
pub fn build_category_table(adapter: &dyn ConfigPort) -> CategoryTable {
    let entries = adapter.section_entries("categories");
    if entries.is_empty() {
        return CategoryTable::default();
    }
    CategoryTable::from_entries(
        entries
            .into_iter()
            .map(|(bucket, raw)| (bucket, CategoryTable::parse_keywords(&raw))),
    )
}

pub fn build_snapshot_store(adapter: &dyn ConfigPort) -> Result<Box<dyn SnapshotPort>, TraderError> {
    let backend = adapter
        .get_string("storage", "backend")
        .unwrap_or_else(|| "json".to_string());
    match backend.as_str() {
        "json" => {
            let path = adapter
                .get_string("storage", "snapshot_path")
                .unwrap_or_else(|| DEFAULT_SNAPSHOT_PATH.to_string());
            Ok(Box::new(JsonSnapshotAdapter::new(path)))
        }
        "memory" => Ok(Box::new(MemorySnapshotAdapter::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Box::new(
            crate::adapters::sqlite_snapshot_adapter::SqliteSnapshotAdapter::from_config(adapter)?,
        )),
        other => Err(TraderError::invalid(
            "storage",
            "backend",
            format!("unsupported backend '{other}'"),
        )),
    }
}

pub fn journal_path(adapter: &dyn ConfigPort) -> PathBuf {
    adapter
        .get_string("storage", "journal_path")
        .unwrap_or_else(|| DEFAULT_JOURNAL_PATH.to_string())
        .into()
}

pub fn market_data_path(adapter: &dyn ConfigPort) -> PathBuf {
    adapter
        .get_string("market_data", "path")
        .unwrap_or_else(|| DEFAULT_MARKET_DATA_PATH.to_string())
        .into()
}

/// Ledger events go to the log unless `[logging] notify = false`.
pub fn build_notifier(adapter: &dyn ConfigPort) -> Box<dyn NotificationPort> {
    if adapter.get_bool("logging", "notify", true) {
        Box::new(LogNotifier)
    } else {
        Box::new(NullNotifier)
    }
}

/// Validates the config and restores the ledger with file-backed ports and the system clock.
pub fn open_ledger(adapter: &dyn ConfigPort) -> Result<RiskLedger, TraderError> {
    validate_config(adapter)?;
    let ports = LedgerPorts {
        store: build_snapshot_store(adapter)?,
        journal: Box::new(CsvJournalAdapter::new(journal_path(adapter))),
        notifier: build_notifier(adapter),
        clock: Box::new(SystemClock),
    };
    RiskLedger::restore(
        build_risk_config(adapter),
        build_category_table(adapter),
        ports,
    )
}

/// Sizing statistics from the journal. An unreadable journal degrades to empty statistics so
/// exits still run; sizing then uses the default Kelly fraction.
fn recent_stats(adapter: &dyn ConfigPort, days: u32) -> TradeStats {
    let path = journal_path(adapter);
    match CsvJournalAdapter::new(&path).read_all() {
        Ok(trades) => TradeStats::over_window(&trades, SystemClock.now(), days),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "trade journal unreadable, using default sizing"
            );
            TradeStats::default()
        }
    }
}

fn run_status(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let mut ledger = open_ledger(config)?;
    ledger.refresh()?;
    println!("{}", ledger.status());

    // Quotes are optional here; status must work without market data.
    let market_data = CsvMarketDataAdapter::new(market_data_path(config)).ok();
    for pos in ledger.positions() {
        let mark = market_data
            .as_ref()
            .and_then(|md| md.current_price(&pos.key).ok().flatten());
        let upnl = match mark {
            Some(price) => format!("upnl {:+.4} @ {price:.4}", pos.unrealized_pnl(price)),
            None => "no quote".to_string(),
        };
        println!(
            "  {} {} [{}] entry {:.4} hwm {:.4} sl {:.4} tp {:.4} size {:.2} {upnl}  {}",
            pos.side,
            pos.key,
            pos.category,
            pos.entry_price,
            pos.high_water_mark,
            pos.stop_loss,
            pos.take_profit,
            pos.size,
            pos.title
        );
    }
    Ok(())
}

fn run_validate(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_config(config)?;
    let risk = build_risk_config(config);
    let cycle = build_cycle_config(config);
    let categories = build_category_table(config);
    println!("Config validated successfully");
    println!(
        "  ledger: balance {:.2}, {} positions, trade size {:.2}-{:.2}",
        risk.initial_balance, risk.max_positions, risk.min_trade_size, risk.max_trade_size
    );
    println!(
        "  exits: stop {:.0}%, take {:.0}%, trailing {:.0}% after +{:.0}%",
        risk.exit_rules.stop_loss_pct * 100.0,
        risk.exit_rules.take_profit_pct * 100.0,
        risk.exit_rules.trailing_stop_pct * 100.0,
        risk.exit_rules.trailing_activation_pct * 100.0
    );
    println!(
        "  circuit breaker: {:.1}% daily loss, {}h cooldown",
        risk.max_daily_loss_pct * 100.0,
        risk.cooldown_hours
    );
    println!(
        "  costs: fee {:.2}%, slippage {:.2}%, min net EV {:.3}, max spread {:.1}%",
        cycle.costs.fee_rate * 100.0,
        cycle.costs.slippage * 100.0,
        cycle.costs.min_net_ev,
        cycle.signal.max_spread_pct
    );
    println!(
        "  categories: {}",
        categories.bucket_names().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

fn run_evaluate(config: &dyn ConfigPort, market: &str) -> Result<(), TraderError> {
    let mut ledger = open_ledger(config)?;
    let cycle_config = build_cycle_config(config);
    let market_data = CsvMarketDataAdapter::new(market_data_path(config))?;
    let mut venue = PaperVenue::new();
    let kelly = cycle_config.kelly_for(&recent_stats(config, cycle_config.stats_days));

    let cycle = TradingCycle::new(&cycle_config, &market_data, &mut venue);
    match cycle.evaluate(&mut ledger, market, kelly)? {
        Evaluation::Skipped(reason) => println!("{market}: skipped ({reason})"),
        Evaluation::Candidate(plan) => {
            println!("{market}: {plan}");
            if let Some(ind) = &plan.signal.indicators {
                println!("  {ind}");
            }
            println!(
                "  edge {:.4} cost {:.4} kelly {:.4}",
                plan.edge.expected_edge, plan.edge.effective_cost, kelly
            );
        }
    }
    Ok(())
}

fn run_cycle(config: &dyn ConfigPort, markets: &[String]) -> Result<(), TraderError> {
    let mut ledger = open_ledger(config)?;
    let cycle_config = build_cycle_config(config);
    let market_data = CsvMarketDataAdapter::new(market_data_path(config))?;
    let candidates = if markets.is_empty() {
        market_data.known_keys()
    } else {
        markets.to_vec()
    };
    let recent = recent_stats(config, cycle_config.stats_days);

    let mut venue = PaperVenue::new();
    let mut cycle = TradingCycle::new(&cycle_config, &market_data, &mut venue);
    let report = cycle.run(&mut ledger, &candidates, &recent)?;
    println!("{report}");
    println!("{}", ledger.status());
    Ok(())
}

fn run_close(config: &dyn ConfigPort, market: &str, price: f64) -> Result<(), TraderError> {
    let mut ledger = open_ledger(config)?;
    if ledger.position(market).is_none() {
        println!("no open position for {market}");
        return Ok(());
    }
    let pnl = ledger.close(market, price, ExitReason::Manual)?;
    println!("closed {market} @ {price:.4} pnl {pnl:+.4}");
    println!("{}", ledger.status());
    Ok(())
}

fn run_report(config: &dyn ConfigPort, days: u32) -> Result<(), TraderError> {
    let trades = CsvJournalAdapter::new(journal_path(config)).read_all()?;
    let stats = TradeStats::over_window(&trades, SystemClock.now(), days);
    println!("=== Last {days} days ===");
    println!("{stats}");
    println!("\n=== By category (all time) ===");
    for (category, cat) in by_category(&trades) {
        println!(
            "  {category:<14} {:>3} trades  win {:>5.1}%  pnl {:+.4}",
            cat.trades,
            cat.win_rate * 100.0,
            cat.pnl
        );
    }
    println!("\n=== By exit reason (all time) ===");
    for (reason, stat) in by_exit_reason(&trades) {
        println!("  {:<14} {:>3} trades  pnl {:+.4}", reason.to_string(), stat.count, stat.pnl);
    }
    println!("\n=== Suggestions ===");
    for hint in suggestions(&stats, &trades) {
        println!("  - {hint}");
    }
    Ok(())
}
