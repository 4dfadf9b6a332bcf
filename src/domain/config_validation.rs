//! Configuration validation.
//!
//! Validates every config section before the ledger is restored. Absent keys fall back to the
//! same defaults the builders use, so an empty file is valid.

use crate::domain::cycle::CycleConfig;
use crate::domain::error::TraderError;
use crate::domain::ledger::RiskConfig;
use crate::ports::config_port::ConfigPort;

pub const STORAGE_BACKENDS: &[&str] = &["json", "sqlite", "memory"];

pub const MAX_COOLDOWN_HOURS: i64 = 24 * 365;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_ledger_config(config)?;
    validate_sizing_config(config)?;
    validate_signal_config(config)?;
    validate_execution_config(config)?;
    validate_categories(config)?;
    validate_storage_config(config)?;
    Ok(())
}

fn ensure(ok: bool, section: &str, key: &str, reason: &str) -> Result<(), TraderError> {
    if ok {
        Ok(())
    } else {
        Err(TraderError::invalid(section, key, reason))
    }
}

pub fn validate_ledger_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let d = RiskConfig::default();
    let s = "ledger";

    let balance = config.get_double(s, "initial_balance", d.initial_balance);
    ensure(balance > 0.0, s, "initial_balance", "initial_balance must be positive")?;

    let max_positions = config.get_int(s, "max_positions", d.max_positions as i64);
    ensure(max_positions >= 1, s, "max_positions", "max_positions must be at least 1")?;

    let min_trade = config.get_double(s, "min_trade_size", d.min_trade_size);
    ensure(min_trade > 0.0, s, "min_trade_size", "min_trade_size must be positive")?;
    let max_trade = config.get_double(s, "max_trade_size", d.max_trade_size);
    ensure(
        max_trade >= min_trade,
        s,
        "max_trade_size",
        "max_trade_size must not be below min_trade_size",
    )?;

    let rules = d.exit_rules;
    let stop_loss = config.get_double(s, "stop_loss", rules.stop_loss_pct);
    ensure(
        stop_loss > 0.0 && stop_loss < 1.0,
        s,
        "stop_loss",
        "stop_loss must be between 0 and 1",
    )?;
    let take_profit = config.get_double(s, "take_profit", rules.take_profit_pct);
    ensure(take_profit > 0.0, s, "take_profit", "take_profit must be positive")?;
    let trailing = config.get_double(s, "trailing_stop", rules.trailing_stop_pct);
    ensure(
        trailing > 0.0 && trailing < 1.0,
        s,
        "trailing_stop",
        "trailing_stop must be between 0 and 1",
    )?;
    let activation = config.get_double(s, "trailing_activation", rules.trailing_activation_pct);
    ensure(
        activation >= 0.0,
        s,
        "trailing_activation",
        "trailing_activation must be non-negative",
    )?;

    let daily_loss = config.get_double(s, "max_daily_loss", d.max_daily_loss_pct);
    ensure(
        daily_loss > 0.0 && daily_loss <= 1.0,
        s,
        "max_daily_loss",
        "max_daily_loss must be in (0, 1]",
    )?;
    let cooldown = config.get_int(s, "cooldown_hours", d.cooldown_hours);
    ensure(
        (0..=MAX_COOLDOWN_HOURS).contains(&cooldown),
        s,
        "cooldown_hours",
        "cooldown_hours must be between 0 and 8760",
    )?;
    Ok(())
}

pub fn validate_sizing_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let d = CycleConfig::default();
    let s = "sizing";

    let base_pct = config.get_double(s, "base_pct", d.base_pct);
    ensure(
        base_pct > 0.0 && base_pct <= 1.0,
        s,
        "base_pct",
        "base_pct must be in (0, 1]",
    )?;
    let max_kelly = config.get_double(s, "max_kelly", d.max_kelly);
    ensure(
        max_kelly > 0.0 && max_kelly <= 1.0,
        s,
        "max_kelly",
        "max_kelly must be in (0, 1]",
    )?;
    let default_kelly = config.get_double(s, "default_kelly", d.default_kelly);
    ensure(
        (0.0..=max_kelly).contains(&default_kelly),
        s,
        "default_kelly",
        "default_kelly must be between 0 and max_kelly",
    )?;
    let min_trades = config.get_int(s, "min_trades_for_kelly", d.min_trades_for_kelly as i64);
    ensure(
        min_trades >= 1,
        s,
        "min_trades_for_kelly",
        "min_trades_for_kelly must be at least 1",
    )?;
    let days = config.get_int(s, "stats_days", i64::from(d.stats_days));
    ensure(days >= 1, s, "stats_days", "stats_days must be at least 1")?;
    Ok(())
}

pub fn validate_signal_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let d = CycleConfig::default();
    let sig = &d.signal;
    let s = "signal";

    let spread = config.get_double(s, "max_spread_pct", sig.max_spread_pct);
    ensure(spread > 0.0, s, "max_spread_pct", "max_spread_pct must be positive")?;

    let periods = [
        ("sma_period", sig.indicators.sma_period),
        ("volatility_period", sig.indicators.volatility_period),
        ("bollinger_period", sig.indicators.bollinger_period),
        ("rsi_period", sig.indicators.rsi_period),
    ];
    for (key, default) in periods {
        let value = config.get_int(s, key, default as i64);
        ensure(value >= 1, s, key, "period must be at least 1")?;
    }

    let mult = config.get_double(s, "bollinger_mult", sig.indicators.bollinger_mult);
    ensure(mult > 0.0, s, "bollinger_mult", "bollinger_mult must be positive")?;

    let min_history = config.get_int(s, "min_history", d.min_history as i64);
    ensure(min_history >= 2, s, "min_history", "min_history must be at least 2")?;

    let threshold = config.get_double(s, "threshold", sig.threshold);
    let strong = config.get_double(s, "strong_threshold", sig.strong_threshold);
    ensure(threshold > 0.0, s, "threshold", "threshold must be positive")?;
    ensure(
        strong >= threshold,
        s,
        "strong_threshold",
        "strong_threshold must not be below threshold",
    )?;
    Ok(())
}

pub fn validate_execution_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let d = CycleConfig::default().costs;
    let s = "execution";

    let fee = config.get_double(s, "fee_rate", d.fee_rate);
    ensure(fee >= 0.0, s, "fee_rate", "fee_rate must be non-negative")?;
    let slippage = config.get_double(s, "slippage", d.slippage);
    ensure(slippage >= 0.0, s, "slippage", "slippage must be non-negative")?;
    Ok(())
}

pub fn validate_categories(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for (bucket, keywords) in config.section_entries("categories") {
        ensure(
            keywords.split(',').any(|k| !k.trim().is_empty()),
            "categories",
            &bucket,
            "category needs at least one keyword",
        )?;
    }
    Ok(())
}

pub fn validate_storage_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let backend = config
        .get_string("storage", "backend")
        .unwrap_or_else(|| "json".to_string());
    ensure(
        STORAGE_BACKENDS.contains(&backend.as_str()),
        "storage",
        "backend",
        "backend must be one of json, sqlite, memory",
    )?;
    if backend == "sqlite" && !cfg!(feature = "sqlite") {
        return Err(TraderError::invalid(
            "storage",
            "backend",
            "sqlite backend requires the sqlite feature",
        ));
    }
    let pool_size = config.get_int("storage", "pool_size", 2);
    ensure(
        (1..=i64::from(u32::MAX)).contains(&pool_size),
        "storage",
        "pool_size",
        "pool_size must be at least 1",
    )?;
    Ok(())
}
