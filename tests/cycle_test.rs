mod common;

use approx::assert_relative_eq;
use common::*;
use probtrader::domain::cycle::{CycleConfig, Evaluation, SkipReason, TradingCycle};
use probtrader::domain::ledger::{Rejection, RiskConfig};
use probtrader::domain::position::{ExitReason, Side};
use probtrader::domain::signal::SignalKind;
use probtrader::domain::stats::TradeStats;

const BTC: &str = "btc-100k";
const ELECTION: &str = "election";
const ETH: &str = "eth-etf";

fn markets() -> MockMarketData {
    MockMarketData::new()
        .with_quote(oversold_quote(BTC, "Will Bitcoin hit 100k?"))
        .with_quote(oversold_quote(ELECTION, "Who wins the presidential election?"))
        .with_quote(oversold_quote(ETH, "Ethereum ETF approved by June?"))
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
}

fn skip_reason<'a>(evaluations: &'a [(String, Evaluation)], key: &str) -> &'a SkipReason {
    match evaluations.iter().find(|(k, _)| k == key) {
        Some((_, Evaluation::Skipped(reason))) => reason,
        other => panic!("expected {key} to be skipped, got {other:?}"),
    }
}

mod opening {
    use super::*;

    #[test]
    fn oversold_market_opens_a_buy_at_the_ask() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        let report = cycle
            .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
            .unwrap();

        let opened = report.opened.expect("a position should open");
        assert_eq!(opened.key, BTC);
        assert_eq!(opened.side, Side::Buy);
        assert_eq!(opened.category, "crypto");
        assert_relative_eq!(opened.entry_price, 0.405);
        assert_relative_eq!(opened.size, 0.5);
        assert_relative_eq!(opened.shares, 0.5 / 0.405, epsilon = 1e-12);
        assert_relative_eq!(ledger.balance(), 9.5, epsilon = 1e-12);

        let orders = venue.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Buy);
        assert_relative_eq!(orders[0].price, 0.405);
    }

    #[test]
    fn candidate_carries_signal_and_edge() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        let cycle = TradingCycle::new(&config, &data, &mut venue);
        let Evaluation::Candidate(plan) = cycle.evaluate(&mut ledger, BTC, 0.05).unwrap() else {
            panic!("expected a candidate");
        };
        assert_eq!(plan.signal.kind, SignalKind::StrongBuy);
        assert_relative_eq!(plan.signal.composite, -0.75, epsilon = 1e-9);
        assert_relative_eq!(plan.signal.confidence, 0.75, epsilon = 1e-9);
        assert_relative_eq!(plan.spread_pct, 2.5, epsilon = 1e-9);
        assert_relative_eq!(plan.edge.expected_edge, (0.504 - 0.40) / 0.504, epsilon = 1e-9);
        assert_relative_eq!(plan.edge.effective_cost, 0.0195, epsilon = 1e-9);
        assert!(plan.edge.net_ev >= config.costs.min_net_ev);
    }

    #[test]
    fn evaluate_does_not_trade() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        let cycle = TradingCycle::new(&config, &data, &mut venue);
        cycle.evaluate(&mut ledger, BTC, 0.05).unwrap();

        assert!(venue.orders().is_empty());
        assert_eq!(ledger.position_count(), 0);
        assert_relative_eq!(ledger.balance(), 10.0);
    }

    #[test]
    fn at_most_one_position_per_cycle() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();
        let candidates = keys(&[BTC, ELECTION]);

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        let first = cycle
            .run(&mut ledger, &candidates, &TradeStats::default())
            .unwrap();
        assert_eq!(first.opened.as_ref().map(|p| p.key.as_str()), Some(BTC));
        assert_eq!(first.evaluations.len(), 1);
        assert_eq!(ledger.position_count(), 1);

        let second = cycle
            .run(&mut ledger, &candidates, &TradeStats::default())
            .unwrap();
        assert_eq!(skip_reason(&second.evaluations, BTC), &SkipReason::AlreadyOpen);
        let opened = second.opened.expect("second market should open");
        assert_eq!(opened.key, ELECTION);
        assert_eq!(opened.category, "politics");
        // 5% of the reduced balance, inside the trade bounds.
        assert_relative_eq!(opened.size, 0.475, epsilon = 1e-12);
        assert_eq!(ledger.position_count(), 2);
    }

    #[test]
    fn second_market_in_same_category_is_rejected() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        cycle
            .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
            .unwrap();
        let report = cycle
            .run(&mut ledger, &keys(&[ETH]), &TradeStats::default())
            .unwrap();

        assert!(report.opened.is_none());
        assert_eq!(
            skip_reason(&report.evaluations, ETH),
            &SkipReason::Rejected(Rejection::CategoryTaken {
                category: "crypto".into()
            })
        );
    }

    #[test]
    fn venue_fill_price_overrides_limit() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        venue.fill_price.set(Some(0.41));
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        let report = cycle
            .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
            .unwrap();

        let opened = report.opened.unwrap();
        assert_relative_eq!(opened.entry_price, 0.41);
        assert_relative_eq!(opened.stop_loss, 0.41 * 0.85, epsilon = 1e-12);
    }

    #[test]
    fn failed_entry_order_is_skipped_and_scan_continues() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        venue.fail_for(BTC);
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        let report = cycle
            .run(&mut ledger, &keys(&[BTC, ELECTION]), &TradeStats::default())
            .unwrap();

        assert!(matches!(
            skip_reason(&report.evaluations, BTC),
            SkipReason::ExecutionFailed(_)
        ));
        assert_eq!(report.opened.map(|p| p.key), Some(ELECTION.to_string()));
        assert!(ledger.position(BTC).is_none());
    }

    #[test]
    fn opened_position_survives_restart() {
        let harness = Harness::new();
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();
        {
            let mut ledger = harness.default_ledger();
            let mut cycle = TradingCycle::new(&config, &data, &mut venue);
            cycle
                .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
                .unwrap();
        }

        let restored = harness.default_ledger();
        assert!(restored.position(BTC).is_some());
        assert_relative_eq!(restored.balance(), 9.5, epsilon = 1e-12);
    }
}

mod exits {
    use super::*;

    #[test]
    fn exits_settle_before_new_entries() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        cycle
            .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
            .unwrap();

        data.set_price(BTC, 0.52);
        let report = cycle
            .run(&mut ledger, &keys(&[ELECTION]), &TradeStats::default())
            .unwrap();

        assert_eq!(report.exits.len(), 1);
        let exit = &report.exits[0];
        assert_eq!(exit.key, BTC);
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert!(!exit.order_failed);
        assert_relative_eq!(exit.pnl, (0.52 - 0.405) * (0.5 / 0.405), epsilon = 1e-9);

        let orders = venue.orders();
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[1].key, BTC);
        assert_eq!(orders[1].side, Side::Sell);
        assert_relative_eq!(orders[1].shares, 0.5 / 0.405, epsilon = 1e-12);
        assert_eq!(orders[2].key, ELECTION);

        assert_eq!(harness.journal.trades().len(), 1);
        assert!(ledger.position(BTC).is_none());
        assert!(ledger.position(ELECTION).is_some());
    }

    #[test]
    fn failed_exit_order_still_settles() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        let venue_handle = venue.clone();
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        cycle
            .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
            .unwrap();

        venue_handle.fail_for(BTC);
        data.set_price(BTC, 0.52);
        let exits = cycle.process_exits(&mut ledger).unwrap();

        assert_eq!(exits.len(), 1);
        assert!(exits[0].order_failed);
        assert!(ledger.position(BTC).is_none());
        assert_relative_eq!(
            ledger.balance(),
            10.0 + (0.52 - 0.405) * (0.5 / 0.405),
            epsilon = 1e-9
        );
        assert_eq!(harness.journal.trades().len(), 1);
    }

    #[test]
    fn unpriced_positions_are_left_open() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        cycle
            .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
            .unwrap();

        data.remove(BTC);
        let exits = cycle.process_exits(&mut ledger).unwrap();
        assert!(exits.is_empty());
        assert!(ledger.position(BTC).is_some());
    }

    #[test]
    fn quiet_market_has_no_exit() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        cycle
            .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
            .unwrap();

        data.set_price(BTC, 0.41);
        assert!(cycle.process_exits(&mut ledger).unwrap().is_empty());
        assert_relative_eq!(ledger.position(BTC).unwrap().high_water_mark, 0.41);
    }
}

mod halting {
    use super::*;

    #[test]
    fn daily_loss_breach_halts_the_scan() {
        let harness = Harness::new();
        let mut ledger = harness.ledger(RiskConfig {
            max_daily_loss_pct: 0.01,
            ..RiskConfig::default()
        });
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        cycle
            .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
            .unwrap();

        data.set_price(BTC, 0.30);
        let report = cycle
            .run(&mut ledger, &keys(&[ELECTION]), &TradeStats::default())
            .unwrap();

        assert_eq!(report.exits.len(), 1);
        assert_eq!(report.exits[0].reason, ExitReason::StopLoss);
        assert!(matches!(report.halted, Some(Rejection::Cooldown { .. })));
        assert!(report.evaluations.is_empty());
        assert!(report.opened.is_none());
        assert_eq!(harness.notifier.cooldowns(), 1);
        assert!(ledger.cooldown_until().is_some());
    }

    #[test]
    fn scan_resumes_after_cooldown_expires() {
        let harness = Harness::new();
        let mut ledger = harness.ledger(RiskConfig {
            max_daily_loss_pct: 0.01,
            ..RiskConfig::default()
        });
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        cycle
            .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
            .unwrap();
        data.set_price(BTC, 0.30);
        cycle
            .run(&mut ledger, &keys(&[]), &TradeStats::default())
            .unwrap();

        harness.clock.advance(chrono::Duration::hours(25));
        let report = cycle
            .run(&mut ledger, &keys(&[ELECTION]), &TradeStats::default())
            .unwrap();
        assert!(report.halted.is_none());
        assert_eq!(report.opened.map(|p| p.key), Some(ELECTION.to_string()));
    }

    #[test]
    fn max_positions_halts_the_scan() {
        let harness = Harness::new();
        let mut ledger = harness.ledger(RiskConfig {
            max_positions: 1,
            ..RiskConfig::default()
        });
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        cycle
            .run(&mut ledger, &keys(&[BTC]), &TradeStats::default())
            .unwrap();
        let report = cycle
            .run(&mut ledger, &keys(&[ELECTION]), &TradeStats::default())
            .unwrap();

        assert_eq!(report.halted, Some(Rejection::MaxPositions { max: 1 }));
        assert!(report.evaluations.is_empty());
        assert_eq!(venue.orders().len(), 1);
    }
}

mod gates {
    use super::*;

    fn evaluate(data: &MockMarketData, config: &CycleConfig, key: &str) -> Evaluation {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let mut venue = MockVenue::new();
        let cycle = TradingCycle::new(config, data, &mut venue);
        cycle.evaluate(&mut ledger, key, 0.05).unwrap()
    }

    fn skipped(evaluation: Evaluation) -> SkipReason {
        match evaluation {
            Evaluation::Skipped(reason) => reason,
            Evaluation::Candidate(plan) => panic!("unexpected candidate {plan}"),
        }
    }

    #[test]
    fn unknown_market_has_no_quote() {
        let data = markets();
        let reason = skipped(evaluate(&data, &CycleConfig::default(), "nope"));
        assert_eq!(reason, SkipReason::NoQuote);
    }

    #[test]
    fn market_data_error_is_a_skip() {
        let data = markets().with_error("broken", "timeout");
        let reason = skipped(evaluate(&data, &CycleConfig::default(), "broken"));
        assert!(matches!(reason, SkipReason::MarketData(msg) if msg.contains("timeout")));
    }

    #[test]
    fn wide_spread_is_rejected() {
        let data = MockMarketData::new().with_quote(quote(
            "wide",
            "Will it rain?",
            0.30,
            0.50,
            oversold_history(),
        ));
        let reason = skipped(evaluate(&data, &CycleConfig::default(), "wide"));
        assert!(matches!(reason, SkipReason::WideSpread { spread_pct } if spread_pct > 49.0));
    }

    #[test]
    fn short_history_is_rejected() {
        let data = MockMarketData::new().with_quote(quote(
            "young",
            "Will it rain?",
            0.395,
            0.405,
            vec![0.50, 0.52, 0.40],
        ));
        let reason = skipped(evaluate(&data, &CycleConfig::default(), "young"));
        assert_eq!(
            reason,
            SkipReason::InsufficientHistory {
                points: 3,
                required: 5
            }
        );
    }

    #[test]
    fn flat_market_has_no_signal() {
        let data = MockMarketData::new().with_quote(flat_quote("flat", "Will it rain?"));
        let reason = skipped(evaluate(&data, &CycleConfig::default(), "flat"));
        assert!(matches!(reason, SkipReason::NoSignal { composite } if composite == 0.0));
    }

    #[test]
    fn edge_below_threshold_is_rejected() {
        let data = markets();
        let mut config = CycleConfig::default();
        config.costs.min_net_ev = 0.5;
        let reason = skipped(evaluate(&data, &config, BTC));
        assert!(matches!(reason, SkipReason::InsufficientEdge { net_ev } if net_ev < 0.5));
    }
}

mod kelly {
    use super::*;

    #[test]
    fn too_few_recent_trades_use_default_kelly() {
        let config = CycleConfig::default();
        let trades = vec![closed_trade("a", "crypto", 0.1, t0())];
        assert_relative_eq!(
            config.kelly_for(&TradeStats::compute(&trades)),
            config.default_kelly
        );
    }

    #[test]
    fn recent_history_caps_trade_size() {
        let harness = Harness::new();
        let mut ledger = harness.default_ledger();
        let data = markets();
        let mut venue = MockVenue::new();
        let config = CycleConfig::default();

        // win rate 0.5, win/loss ratio 1.2: half-Kelly 1/24
        let trades: Vec<_> = (0..6)
            .map(|i| {
                let pnl = if i % 2 == 0 { 0.12 } else { -0.10 };
                closed_trade(&format!("t{i}"), "sports", pnl, t0())
            })
            .collect();
        let recent = TradeStats::compute(&trades);
        let kelly = config.kelly_for(&recent);
        assert_relative_eq!(kelly, 1.0 / 24.0, epsilon = 1e-9);

        let mut cycle = TradingCycle::new(&config, &data, &mut venue);
        let report = cycle.run(&mut ledger, &keys(&[BTC]), &recent).unwrap();
        assert_relative_eq!(report.opened.unwrap().size, 10.0 / 24.0, epsilon = 1e-9);
    }
}
