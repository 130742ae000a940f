use kestrel_domain::entities::equity::update_drawdown;
use kestrel_domain::entities::ledger::CommissionModel;
use kestrel_domain::entities::metrics::{compute_results, MetricsConfig, ReturnBucketing};
use kestrel_domain::services::engine::backtest::{BacktestConfig, BacktestRunner};
use kestrel_domain::services::engine::execution::ExecutionConfig;
use kestrel_domain::services::market_data_source::VecTickSource;
use kestrel_domain::services::strategy::ScriptedStrategy;
use kestrel_domain::value_objects::signal::{Signal, SignalType};
use kestrel_domain::value_objects::tick::Tick;
use proptest::prelude::*;

const SYMBOLS: [&str; 2] = ["AAA", "BBB"];
const HOUR_NS: i64 = 3_600_000_000_000;

fn ticks_from(prices: &[f64]) -> Vec<Tick> {
    prices
        .iter()
        .enumerate()
        .map(|(idx, price)| Tick {
            timestamp: idx as i64 * HOUR_NS,
            symbol: SYMBOLS[idx % SYMBOLS.len()].to_string(),
            price: *price,
            volume: 1_000.0,
            bid: price - 0.01,
            ask: price + 0.01,
        })
        .collect()
}

fn scripted(actions: &[(usize, bool, bool, f64, u32)], price_hint: f64) -> ScriptedStrategy {
    actions
        .iter()
        .fold(ScriptedStrategy::new(), |strategy, (idx, symbol_b, entry, qty, urgency)| {
            let signal_type = if *entry {
                SignalType::Entry
            } else {
                SignalType::Exit
            };
            let strength = if *entry == (*qty > 5.0) { 1.0 } else { -1.0 };
            strategy.at(
                *idx,
                Signal {
                    timestamp: 0,
                    symbol: SYMBOLS[usize::from(*symbol_b)].to_string(),
                    strategy_id: "prop".to_string(),
                    signal_strength: strength,
                    confidence: 0.5,
                    suggested_quantity: *qty,
                    suggested_price: (price_hint * 100.0) as i64,
                    urgency: *urgency,
                    signal_type,
                },
            )
        })
}

fn action_strategy() -> impl Strategy<Value = Vec<(usize, bool, bool, f64, u32)>> {
    prop::collection::vec(
        (0usize..60, any::<bool>(), any::<bool>(), 0.5f64..10.0, 0u32..200),
        0..40,
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn runs_conserve_capital_and_close_everything(
        prices in prop::collection::vec(1.0f64..500.0, 1..60),
        actions in action_strategy(),
        per_fill in 0.0f64..2.0,
        bps in 0.0f64..20.0,
        seed in any::<u64>(),
    ) {
        let initial = 1_000_000.0;
        let config = BacktestConfig {
            run_id: "prop".to_string(),
            initial_capital: initial,
            commission: CommissionModel { per_fill, bps },
            execution: ExecutionConfig { seed, ..ExecutionConfig::default() },
            metrics: MetricsConfig::default(),
        };
        let mut runner = BacktestRunner::new(
            config,
            scripted(&actions, prices[0]),
            VecTickSource::new(ticks_from(&prices)),
        );
        let out = runner.run();

        prop_assert_eq!(runner.ledger().open_trade_count(), 0);
        let pnl_sum: f64 = out.trades.iter().map(|t| t.pnl.unwrap_or(f64::NAN)).sum();
        prop_assert!((out.results.final_capital - (initial + pnl_sum)).abs() < 1e-6);

        let r = &out.results;
        prop_assert!((0.0..=1.0).contains(&r.win_rate));
        prop_assert_eq!(r.winning_trades + r.losing_trades, r.total_trades);
        prop_assert_eq!(r.total_trades, out.trades.len());
        prop_assert!(r.best_trade >= r.worst_trade);
        prop_assert!(r.sharpe_ratio.is_finite());
        prop_assert_eq!(r.equity_curve.len(), prices.len());
    }

    #[test]
    fn aggregation_is_repeatable(
        prices in prop::collection::vec(1.0f64..500.0, 1..60),
        actions in action_strategy(),
        window in 1usize..8,
    ) {
        let config = BacktestConfig {
            metrics: MetricsConfig {
                bucketing: ReturnBucketing::FixedWindow(window),
                ..MetricsConfig::default()
            },
            ..BacktestConfig::default()
        };
        let metrics = config.metrics;
        let mut runner = BacktestRunner::new(
            config,
            scripted(&actions, prices[0]),
            VecTickSource::new(ticks_from(&prices)),
        );
        let first = runner.run();
        let second = compute_results(runner.ledger(), runner.tracker(), &metrics);
        prop_assert_eq!(first.results, second);
    }

    #[test]
    fn drawdown_and_high_water_mark_never_decrease(
        equity in prop::collection::vec(0.01f64..100_000.0, 1..200),
        initial in 0.01f64..100_000.0,
    ) {
        let mut hwm = initial;
        let mut mdd = 0.0;
        for value in equity {
            let (prev_hwm, prev_mdd) = (hwm, mdd);
            update_drawdown(&mut hwm, &mut mdd, value);
            prop_assert!(hwm >= prev_hwm);
            prop_assert!(mdd >= prev_mdd);
            prop_assert!((0.0..=1.0).contains(&mdd));
        }
    }
}
