use kestrel_domain::entities::ledger::CommissionModel;
use kestrel_domain::services::engine::backtest::{BacktestConfig, BacktestRunner};
use kestrel_domain::services::market_data_source::{TickSeries, VecTickSource};
use kestrel_domain::services::strategy::{HoldStrategy, ScriptedStrategy};
use kestrel_domain::value_objects::signal::{Signal, SignalType};
use kestrel_domain::value_objects::tick::Tick;
use kestrel_domain::value_objects::trade::ExitReason;

fn tick(ts: i64, symbol: &str, price: f64) -> Tick {
    Tick {
        timestamp: ts,
        symbol: symbol.to_string(),
        price,
        volume: 1_000.0,
        bid: price - 0.01,
        ask: price + 0.01,
    }
}

fn market(symbol: &str, signal_type: SignalType, strength: f64, qty: f64) -> Signal {
    Signal {
        timestamp: 0,
        symbol: symbol.to_string(),
        strategy_id: "scripted".to_string(),
        signal_strength: strength,
        confidence: 1.0,
        suggested_quantity: qty,
        suggested_price: 0,
        urgency: 100,
        signal_type,
    }
}

fn config(initial_capital: f64) -> BacktestConfig {
    BacktestConfig {
        run_id: "scenario".to_string(),
        initial_capital,
        ..BacktestConfig::default()
    }
}

#[test]
fn synthetic_run_without_signals_is_flat() {
    let mut series = TickSeries::new(11);
    series
        .generate("SYN", 0, 3 * 86_400_000_000_000, 3_600_000_000_000)
        .expect("generate");

    let mut runner = BacktestRunner::new(config(100_000.0), HoldStrategy, series);
    let out = runner.run();

    assert_eq!(out.results.ticks_processed, 72);
    assert_eq!(out.results.total_trades, 0);
    assert_eq!(out.results.win_rate, 0.0);
    assert_eq!(out.results.total_return, 0.0);
    assert_eq!(out.results.sharpe_ratio, 0.0);
    assert_eq!(out.results.max_drawdown, 0.0);
    assert_eq!(out.results.final_capital, 100_000.0);
    assert_eq!(out.results.equity_curve.len(), 72);
}

#[test]
fn entry_then_exit_books_single_trade_pnl() {
    let strategy = ScriptedStrategy::new()
        .at(0, market("AAPL", SignalType::Entry, 1.0, 100.0))
        .at(1, market("AAPL", SignalType::Exit, -1.0, 100.0));
    let data = VecTickSource::new(vec![tick(1, "AAPL", 100.0), tick(2, "AAPL", 101.0)]);

    let mut runner = BacktestRunner::new(config(100_000.0), strategy, data);
    let out = runner.run();

    assert_eq!(out.trades.len(), 1);
    let trade = &out.trades[0];
    assert!((trade.pnl.expect("closed") - 100.0).abs() < 1e-9);
    assert_eq!(trade.exit_reason, Some(ExitReason::Signal));
    assert_eq!(trade.entry_order_id, 1);
    assert_eq!(trade.exit_order_id, Some(2));
    assert!((out.results.final_capital - 100_100.0).abs() < 1e-9);
    assert_eq!(out.results.winning_trades, 1);
    assert_eq!(out.results.win_rate, 1.0);
    assert!((out.results.avg_trade_duration - 1.0).abs() < 1e-12);
}

#[test]
fn entry_on_open_symbol_keeps_one_trade() {
    let strategy = ScriptedStrategy::new()
        .at(0, market("AAPL", SignalType::Entry, 1.0, 10.0))
        .at(1, market("AAPL", SignalType::Entry, 1.0, 10.0));
    let data = VecTickSource::new(vec![
        tick(1, "AAPL", 100.0),
        tick(2, "AAPL", 100.0),
        tick(3, "AAPL", 100.0),
    ]);

    let mut runner = BacktestRunner::new(config(10_000.0), strategy, data);
    assert!(runner.step());
    assert!(runner.step());
    assert_eq!(runner.ledger().open_trade_count(), 1);
    assert_eq!(runner.strategy().fills().len(), 2);

    let out = runner.run();
    assert_eq!(out.trades.len(), 1);
    assert!(out
        .audit_events
        .iter()
        .any(|event| event.action == "duplicate_entry"));
}

#[test]
fn open_trade_is_force_closed_at_final_price() {
    let strategy = ScriptedStrategy::new().at(0, market("AAPL", SignalType::Entry, 1.0, 100.0));
    let data = VecTickSource::new(vec![
        tick(1, "AAPL", 100.0),
        tick(2, "AAPL", 103.0),
        tick(3, "AAPL", 105.0),
    ]);

    let mut runner = BacktestRunner::new(config(100_000.0), strategy, data);
    while runner.step() {}
    assert_eq!(runner.ledger().closed_trade_count(), 0);
    assert_eq!(runner.ledger().open_trade_count(), 1);

    let out = runner.finish();
    assert_eq!(runner.ledger().closed_trade_count(), 1);
    assert_eq!(runner.ledger().open_trade_count(), 0);
    let trade = &out.trades[0];
    assert_eq!(trade.exit_price, Some(105.0));
    assert_eq!(trade.exit_time, Some(3));
    assert_eq!(trade.exit_reason, Some(ExitReason::EndOfRun));
    assert!((out.results.final_capital - 100_500.0).abs() < 1e-9);
    assert!((runner.ledger().cash() - 100_500.0).abs() < 1e-9);
}

#[test]
fn forced_close_uses_each_symbols_last_price() {
    let strategy = ScriptedStrategy::new()
        .at(0, market("A", SignalType::Entry, 1.0, 10.0))
        .at(1, market("B", SignalType::Entry, -1.0, 10.0));
    let data = VecTickSource::new(vec![
        tick(1, "A", 50.0),
        tick(2, "B", 20.0),
        tick(3, "A", 55.0),
        tick(4, "B", 18.0),
    ]);

    let mut runner = BacktestRunner::new(config(10_000.0), strategy, data);
    let out = runner.run();

    assert_eq!(out.trades.len(), 2);
    let a = out.trades.iter().find(|t| t.symbol == "A").expect("A closed");
    let b = out.trades.iter().find(|t| t.symbol == "B").expect("B closed");
    assert_eq!(a.exit_price, Some(55.0));
    assert!((a.pnl.unwrap() - 50.0).abs() < 1e-9);
    assert_eq!(b.exit_price, Some(18.0));
    assert!((b.pnl.unwrap() - 20.0).abs() < 1e-9);
    assert!((out.results.final_capital - 10_070.0).abs() < 1e-9);
}

#[test]
fn exit_without_entry_is_absorbed() {
    let strategy = ScriptedStrategy::new().at(0, market("A", SignalType::Exit, -1.0, 1.0));
    let data = VecTickSource::new(vec![tick(1, "A", 10.0)]);
    let mut runner = BacktestRunner::new(config(1_000.0), strategy, data);
    let out = runner.run();

    assert_eq!(out.results.total_trades, 0);
    assert_eq!(out.results.final_capital, 1_000.0);
    assert!(out
        .audit_events
        .iter()
        .any(|event| event.action == "exit_without_entry"));
}

#[test]
fn commissions_are_netted_and_capital_conserved() {
    let strategy = ScriptedStrategy::new()
        .at(0, market("A", SignalType::Entry, 1.0, 10.0))
        .at(2, market("A", SignalType::Exit, -1.0, 10.0))
        .at(3, market("A", SignalType::Entry, -1.0, 5.0));
    let data = VecTickSource::new((0..6).map(|i| tick(i, "A", 100.0 + i as f64)).collect());

    let mut runner = BacktestRunner::new(
        BacktestConfig {
            commission: CommissionModel {
                per_fill: 1.5,
                bps: 10.0,
            },
            ..config(50_000.0)
        },
        strategy,
        data,
    );
    let out = runner.run();

    let pnl_sum: f64 = out.trades.iter().map(|t| t.pnl.unwrap()).sum();
    assert!((out.results.final_capital - (50_000.0 + pnl_sum)).abs() < 1e-6);
    assert!(out.results.total_commission > 0.0);
    assert_eq!(out.results.total_trades, 2);
}

#[test]
fn entry_commission_is_out_of_equity_while_trade_is_open() {
    let strategy = ScriptedStrategy::new()
        .at(0, market("A", SignalType::Entry, 1.0, 10.0))
        .at(2, market("A", SignalType::Exit, -1.0, 10.0));
    let data = VecTickSource::new((0..3).map(|i| tick(i, "A", 100.0)).collect());

    let mut runner = BacktestRunner::new(
        BacktestConfig {
            commission: CommissionModel {
                per_fill: 50.0,
                bps: 0.0,
            },
            ..config(10_000.0)
        },
        strategy,
        data,
    );
    let out = runner.run();

    let curve: Vec<f64> = out.results.equity_curve.iter().map(|p| p.equity).collect();
    assert_eq!(curve, vec![9_950.0, 9_950.0, 9_900.0]);
    assert!((out.results.max_drawdown - 0.01).abs() < 1e-12);
    assert_eq!(out.results.final_capital, 9_900.0);
}

#[test]
fn lifecycle_hooks_fire_once_and_in_order() {
    let strategy = ScriptedStrategy::new().at(1, market("A", SignalType::Entry, 1.0, 1.0));
    let data = VecTickSource::new(vec![tick(1, "A", 1.0), tick(2, "A", 2.0)]);
    let mut runner = BacktestRunner::new(config(100.0), strategy, data);
    runner.run();
    let again = runner.finish();

    assert_eq!(runner.strategy().starts(), 1);
    assert_eq!(runner.strategy().stops(), 1);
    assert_eq!(runner.strategy().ticks_seen(), 2);
    assert_eq!(runner.strategy().fills().len(), 1);
    assert_eq!(runner.strategy().fills()[0].timestamp, 2);
    assert_eq!(again.trades.len(), 1);
    assert!(!runner.step());
}

#[test]
fn empty_data_source_finishes_cleanly() {
    let mut runner = BacktestRunner::new(config(100.0), HoldStrategy, VecTickSource::default());
    let out = runner.run();
    assert_eq!(out.results.ticks_processed, 0);
    assert!(out.results.daily_returns.is_empty());
    assert_eq!(out.results.final_capital, 100.0);
    let actions: Vec<_> = out.audit_events.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["start", "complete"]);
}
