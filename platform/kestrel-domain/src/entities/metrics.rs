use crate::entities::equity::{replay_drawdown, EquityTracker};
use crate::entities::ledger::TradeLedger;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::trade::{ExitReason, Trade};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// How the equity curve is cut into periods for `daily_returns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnBucketing {
    /// Last sample of each UTC calendar day.
    CalendarDay,
    /// Every n-th sample starting at index 0.
    FixedWindow(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsConfig {
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
    pub bucketing: ReturnBucketing,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            periods_per_year: 252.0,
            bucketing: ReturnBucketing::CalendarDay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Mean holding time in nanoseconds.
    pub avg_trade_duration: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub total_commission: f64,
    pub ticks_processed: usize,
    pub daily_returns: Vec<f64>,
    #[serde(skip)]
    pub equity_curve: Vec<EquityPoint>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TradeStats {
    pub total: usize,
    pub winning: usize,
    pub losing: usize,
    pub win_rate: f64,
    pub best: f64,
    pub worst: f64,
    pub avg_duration_ns: f64,
    pub total_commission: f64,
}

/// Reduces a finished ledger and tracker into `Results`. Reads only, so
/// calling it twice on the same state yields identical output.
pub fn compute_results(
    ledger: &TradeLedger,
    tracker: &EquityTracker,
    config: &MetricsConfig,
) -> Results {
    let trades: Vec<&Trade> = ledger.closed_trades().collect();
    let stats = trade_stats(trades.iter().copied());
    let curve = tracker.equity_curve();
    let final_capital = if ledger.open_trade_count() == 0 {
        ledger.cash()
    } else {
        curve
            .last()
            .map(|point| point.equity)
            .unwrap_or_else(|| ledger.cash())
    };
    build_results(
        ledger.initial_capital(),
        final_capital,
        stats,
        tracker.max_drawdown(),
        curve,
        config,
    )
}

/// Same reduction over persisted artifacts. The drawdown is replayed from the
/// curve since no tracker state survives a run.
pub fn results_from_parts(
    initial_capital: f64,
    trades: &[Trade],
    curve: &[EquityPoint],
    config: &MetricsConfig,
) -> Results {
    let stats = trade_stats(trades.iter().filter(|trade| !trade.is_open()));
    let (_, max_drawdown) = replay_drawdown(initial_capital, curve);
    let final_capital = match curve.last() {
        None => initial_capital,
        Some(last) if last.open_trades == 0 => last.equity,
        // Positions still open at the last sample were force-closed after it;
        // replay their cash returns in close order.
        Some(last) => trades
            .iter()
            .filter(|trade| trade.exit_reason == Some(ExitReason::EndOfRun))
            .fold(last.cash, |cash, trade| {
                cash + (trade.reserved_notional() + trade.commission + trade.pnl.unwrap_or(0.0))
            }),
    };
    build_results(initial_capital, final_capital, stats, max_drawdown, curve, config)
}

fn build_results(
    initial_capital: f64,
    final_capital: f64,
    stats: TradeStats,
    max_drawdown: f64,
    curve: &[EquityPoint],
    config: &MetricsConfig,
) -> Results {
    let daily_returns = daily_returns(curve, config.bucketing);
    let sharpe_ratio = sharpe_ratio(&daily_returns, config);
    Results {
        initial_capital,
        final_capital,
        total_return: total_return(initial_capital, final_capital),
        sharpe_ratio,
        max_drawdown,
        win_rate: stats.win_rate,
        total_trades: stats.total,
        winning_trades: stats.winning,
        losing_trades: stats.losing,
        avg_trade_duration: stats.avg_duration_ns,
        best_trade: stats.best,
        worst_trade: stats.worst,
        total_commission: stats.total_commission,
        ticks_processed: curve.len(),
        daily_returns,
        equity_curve: curve.to_vec(),
    }
}

pub fn total_return(initial_capital: f64, final_capital: f64) -> f64 {
    if initial_capital > 0.0 {
        (final_capital - initial_capital) / initial_capital
    } else {
        0.0
    }
}

pub fn trade_stats<'a, I>(trades: I) -> TradeStats
where
    I: IntoIterator<Item = &'a Trade>,
{
    let mut stats = TradeStats::default();
    let mut best = f64::NEG_INFINITY;
    let mut worst = f64::INFINITY;
    let mut duration_sum = 0.0;

    for trade in trades {
        let pnl = trade.pnl.unwrap_or(0.0);
        stats.total += 1;
        if pnl > 0.0 {
            stats.winning += 1;
        }
        best = best.max(pnl);
        worst = worst.min(pnl);
        duration_sum += trade.duration_ns().unwrap_or(0) as f64;
        stats.total_commission += trade.commission;
    }

    if stats.total > 0 {
        stats.losing = stats.total - stats.winning;
        stats.win_rate = stats.winning as f64 / stats.total as f64;
        stats.best = best;
        stats.worst = worst;
        stats.avg_duration_ns = duration_sum / stats.total as f64;
    }
    stats
}

/// Period-over-period returns of the equity curve. Fewer than two period
/// closes give an empty vector.
pub fn daily_returns(curve: &[EquityPoint], bucketing: ReturnBucketing) -> Vec<f64> {
    let closes = match bucketing {
        ReturnBucketing::CalendarDay => day_closes(curve),
        ReturnBucketing::FixedWindow(size) => curve
            .iter()
            .step_by(size.max(1))
            .map(|point| point.equity)
            .collect(),
    };

    closes
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect()
}

fn day_closes(curve: &[EquityPoint]) -> Vec<f64> {
    let mut closes = Vec::new();
    let mut current: Option<(NaiveDate, f64)> = None;
    for point in curve {
        let day = utc_day(point.timestamp);
        match current {
            Some((open_day, _)) if open_day == day => {
                current = Some((day, point.equity));
            }
            Some((_, close)) => {
                closes.push(close);
                current = Some((day, point.equity));
            }
            None => current = Some((day, point.equity)),
        }
    }
    if let Some((_, close)) = current {
        closes.push(close);
    }
    closes
}

fn utc_day(timestamp_ns: i64) -> NaiveDate {
    DateTime::from_timestamp_nanos(timestamp_ns).date_naive()
}

/// Annualized Sharpe over per-period returns, using the sample (n-1)
/// standard deviation. Zero when it cannot be computed.
pub fn sharpe_ratio(returns: &[f64], config: &MetricsConfig) -> f64 {
    if returns.len() < 2 || config.periods_per_year <= 0.0 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns
        .iter()
        .map(|ret| {
            let diff = ret - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);

    let std = var.sqrt();
    if std > 0.0 && std.is_finite() {
        let periodic_rf = config.risk_free_rate / config.periods_per_year;
        (mean - periodic_rf) * config.periods_per_year.sqrt() / std
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::{
        compute_results, daily_returns, results_from_parts, sharpe_ratio, trade_stats,
        MetricsConfig, ReturnBucketing,
    };
    use crate::entities::equity::EquityTracker;
    use crate::entities::ledger::{CommissionModel, TradeLedger};
    use crate::value_objects::equity_point::EquityPoint;
    use crate::value_objects::trade::{ExitReason, Trade};

    const DAY_NS: i64 = 86_400_000_000_000;

    fn point(ts: i64, equity: f64) -> EquityPoint {
        EquityPoint {
            timestamp: ts,
            equity,
            cash: equity,
            open_trades: 0,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
        }
    }

    fn closed(entry: i64, exit: i64, pnl: f64) -> Trade {
        Trade {
            symbol: "X".to_string(),
            strategy_id: "t".to_string(),
            entry_order_id: 1,
            exit_order_id: Some(2),
            entry_time: entry,
            exit_time: Some(exit),
            entry_price: 10.0,
            exit_price: Some(10.0),
            signed_quantity: 1.0,
            commission: 0.0,
            pnl: Some(pnl),
            exit_reason: Some(ExitReason::Signal),
        }
    }

    #[test]
    fn empty_run_degrades_to_zeroes() {
        let ledger = TradeLedger::new(100_000.0, CommissionModel::zero());
        let tracker = EquityTracker::new(100_000.0);
        let results = compute_results(&ledger, &tracker, &MetricsConfig::default());

        assert_eq!(results.total_trades, 0);
        assert_eq!(results.total_return, 0.0);
        assert_eq!(results.sharpe_ratio, 0.0);
        assert_eq!(results.max_drawdown, 0.0);
        assert_eq!(results.win_rate, 0.0);
        assert_eq!(results.best_trade, 0.0);
        assert_eq!(results.worst_trade, 0.0);
        assert!(results.daily_returns.is_empty());
        assert!(results.equity_curve.is_empty());
        assert_eq!(results.final_capital, 100_000.0);
    }

    #[test]
    fn stats_split_winners_from_rest() {
        let trades = [closed(0, 10, 5.0), closed(0, 30, 0.0), closed(10, 30, -2.0)];
        let stats = trade_stats(trades.iter());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.winning, 1);
        assert_eq!(stats.losing, 2);
        assert!((stats.win_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.best, 5.0);
        assert_eq!(stats.worst, -2.0);
        assert!((stats.avg_duration_ns - 20.0).abs() < 1e-12);
    }

    #[test]
    fn calendar_day_returns_use_last_sample_of_each_day() {
        let curve = vec![
            point(0, 100.0),
            point(DAY_NS / 2, 105.0),
            point(DAY_NS, 110.0),
            point(DAY_NS + 1, 99.0),
            point(2 * DAY_NS, 121.0),
        ];
        let returns = daily_returns(&curve, ReturnBucketing::CalendarDay);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - (99.0 / 105.0 - 1.0)).abs() < 1e-12);
        assert!((returns[1] - (121.0 / 99.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn single_day_has_no_returns() {
        let curve = vec![point(0, 100.0), point(1, 101.0), point(2, 102.0)];
        assert!(daily_returns(&curve, ReturnBucketing::CalendarDay).is_empty());
    }

    #[test]
    fn fixed_window_samples_every_nth_point() {
        let curve: Vec<_> = (0..7).map(|i| point(i, 100.0 + i as f64)).collect();
        let returns = daily_returns(&curve, ReturnBucketing::FixedWindow(3));
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - (103.0 / 100.0 - 1.0)).abs() < 1e-12);
        assert!((returns[1] - (106.0 / 103.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn sharpe_is_zero_for_constant_or_short_series() {
        let config = MetricsConfig::default();
        assert_eq!(sharpe_ratio(&[], &config), 0.0);
        assert_eq!(sharpe_ratio(&[0.01], &config), 0.0);
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], &config), 0.0);
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        let config = MetricsConfig::default();
        let returns = [0.01, -0.005, 0.02];
        let mean = 0.025 / 3.0;
        let var = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / 2.0;
        let expected = (mean - 0.02 / 252.0) * 252f64.sqrt() / var.sqrt();
        assert!((sharpe_ratio(&returns, &config) - expected).abs() < 1e-12);
    }

    #[test]
    fn recomputing_from_parts_matches_live_results() {
        let mut ledger = TradeLedger::new(1_000.0, CommissionModel::zero());
        let mut tracker = EquityTracker::new(1_000.0);
        let config = MetricsConfig {
            bucketing: ReturnBucketing::FixedWindow(1),
            ..MetricsConfig::default()
        };
        for (ts, equity_price) in [(1, 10.0), (2, 12.0), (3, 9.0)] {
            tracker.observe(&crate::value_objects::tick::Tick {
                timestamp: ts,
                symbol: "X".to_string(),
                price: equity_price,
                volume: 1.0,
                bid: equity_price,
                ask: equity_price,
            });
            tracker.record(ts, &ledger);
        }
        ledger.liquidate(3, |_| None, 9.0);

        let live = compute_results(&ledger, &tracker, &config);
        let again = compute_results(&ledger, &tracker, &config);
        assert_eq!(live, again);

        let trades: Vec<_> = ledger.closed_trades().cloned().collect();
        let replayed = results_from_parts(1_000.0, &trades, tracker.equity_curve(), &config);
        assert_eq!(live, replayed);
    }

    #[test]
    fn replay_accounts_for_positions_closed_after_last_sample() {
        use crate::value_objects::order::{OrderStatus, SimulatedOrder};
        use crate::value_objects::side::Side;
        use crate::value_objects::signal::SignalType;
        use crate::value_objects::tick::Tick;

        let mut ledger = TradeLedger::new(
            10_000.0,
            CommissionModel {
                per_fill: 1.25,
                bps: 3.0,
            },
        );
        let mut tracker = EquityTracker::new(10_000.0);
        let config = MetricsConfig::default();
        for (ts, symbol, price) in [(1, "A", 10.3), (2, "B", 55.7), (3, "A", 10.9), (4, "B", 54.1)] {
            tracker.observe(&Tick {
                timestamp: ts,
                symbol: symbol.to_string(),
                price,
                volume: 1.0,
                bid: price,
                ask: price,
            });
            if ts <= 2 {
                ledger.apply_fill(
                    SignalType::Entry,
                    &SimulatedOrder {
                        order_id: ts as u64,
                        timestamp: ts,
                        symbol: symbol.to_string(),
                        strategy_id: "t".to_string(),
                        quantity: 7.0,
                        side: if ts == 1 { Side::Buy } else { Side::Sell },
                        status: OrderStatus::Filled,
                        fill_price: price,
                    },
                );
            }
            tracker.record(ts, &ledger);
        }
        ledger.liquidate(4, |symbol| tracker.last_price(symbol), 54.1);

        let live = compute_results(&ledger, &tracker, &config);
        assert_eq!(live.final_capital, ledger.cash());
        let trades: Vec<_> = ledger.closed_trades().cloned().collect();
        let replayed = results_from_parts(10_000.0, &trades, tracker.equity_curve(), &config);
        assert_eq!(live, replayed);
    }
}
