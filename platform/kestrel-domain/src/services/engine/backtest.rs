use crate::entities::equity::EquityTracker;
use crate::entities::ledger::{CommissionModel, LedgerOutcome, TradeLedger};
use crate::entities::metrics::{compute_results, MetricsConfig, Results};
use crate::services::audit::AuditEvent;
use crate::services::engine::execution::{ExecutionConfig, ExecutionSimulator};
use crate::services::market_data_source::MarketDataSource;
use crate::services::strategy::Strategy;
use crate::value_objects::order::SimulatedOrder;
use crate::value_objects::signal::{Signal, SignalType};
use crate::value_objects::tick::Tick;
use crate::value_objects::trade::Trade;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub run_id: String,
    pub initial_capital: f64,
    pub commission: CommissionModel,
    pub execution: ExecutionConfig,
    pub metrics: MetricsConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            run_id: "run".to_string(),
            initial_capital: 100_000.0,
            commission: CommissionModel::zero(),
            execution: ExecutionConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResults {
    pub results: Results,
    /// Closed trades in close order.
    pub trades: Vec<Trade>,
    pub audit_events: Vec<AuditEvent>,
}

/// Drives one strategy over one data source, a tick at a time.
///
/// `step` fully processes a single tick; `finish` stops the strategy,
/// force-closes whatever is still open and aggregates. `run` is both.
pub struct BacktestRunner<S, D>
where
    S: Strategy,
    D: MarketDataSource,
{
    run_id: String,
    strategy: S,
    data: D,
    simulator: ExecutionSimulator,
    ledger: TradeLedger,
    tracker: EquityTracker,
    metrics_config: MetricsConfig,
    audit_events: Vec<AuditEvent>,
    last_tick: Option<Tick>,
    ticks_processed: usize,
    started: bool,
    stopped: bool,
}

impl<S, D> BacktestRunner<S, D>
where
    S: Strategy,
    D: MarketDataSource,
{
    pub fn new(config: BacktestConfig, strategy: S, data: D) -> Self {
        Self {
            run_id: config.run_id,
            strategy,
            data,
            simulator: ExecutionSimulator::new(config.execution),
            ledger: TradeLedger::new(config.initial_capital, config.commission),
            tracker: EquityTracker::new(config.initial_capital),
            metrics_config: config.metrics,
            audit_events: Vec::new(),
            last_tick: None,
            ticks_processed: 0,
            started: false,
            stopped: false,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn tracker(&self) -> &EquityTracker {
        &self.tracker
    }

    pub fn ticks_processed(&self) -> usize {
        self.ticks_processed
    }

    pub fn run(&mut self) -> BacktestResults {
        while self.step() {}
        self.finish()
    }

    /// Processes the next tick. Returns false once the source is exhausted
    /// or the run has been finished.
    pub fn step(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.ensure_started();
        let Some(tick) = self.data.next_tick() else {
            return false;
        };

        self.tracker.observe(&tick);
        self.strategy.on_market_data(&tick);
        self.strategy.on_tick();

        while let Some(signal) = self.strategy.next_signal() {
            let order = self.simulator.fill(&signal, &tick);
            self.strategy.on_order_fill(&order);
            self.apply_order(&signal, &order);
        }

        self.tracker.record(tick.timestamp, &self.ledger);
        self.ticks_processed += 1;
        self.last_tick = Some(tick);
        true
    }

    /// Stops the strategy (once), closes open trades at their symbols' last
    /// prices and aggregates. Safe to call again; later calls only
    /// re-aggregate.
    pub fn finish(&mut self) -> BacktestResults {
        self.ensure_started();
        if !self.stopped {
            self.strategy.stop();
            self.stopped = true;
            self.liquidate();
            self.push_complete_event();
        }

        let results = compute_results(&self.ledger, &self.tracker, &self.metrics_config);
        BacktestResults {
            results,
            trades: self.ledger.closed_trades().cloned().collect(),
            audit_events: self.audit_events.clone(),
        }
    }

    fn ensure_started(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.strategy.start();
        tracing::info!(run_id = %self.run_id, strategy = self.strategy.name(), "backtest started");
        self.audit_events.push(AuditEvent {
            run_id: self.run_id.clone(),
            timestamp: 0,
            stage: "engine".to_string(),
            symbol: None,
            action: "start".to_string(),
            error: None,
            details: json!({
                "strategy": self.strategy.name(),
                "initial_capital": self.ledger.initial_capital(),
            }),
        });
    }

    fn apply_order(&mut self, signal: &Signal, order: &SimulatedOrder) {
        let outcome = self.ledger.apply_fill(signal.signal_type, order);
        let signal_type = match signal.signal_type {
            SignalType::Entry => "entry",
            SignalType::Exit => "exit",
        };

        if outcome.is_noop() {
            tracing::warn!(
                run_id = %self.run_id,
                symbol = %order.symbol,
                order_id = order.order_id,
                outcome = outcome.as_str(),
                "fill ignored by ledger"
            );
        } else {
            tracing::debug!(
                symbol = %order.symbol,
                order_id = order.order_id,
                side = order.side.as_str(),
                qty = order.quantity,
                price = order.fill_price,
                outcome = outcome.as_str(),
                "order filled"
            );
        }

        let stage = if outcome.is_noop() { "ledger" } else { "trade" };
        let mut details = json!({
            "order_id": order.order_id,
            "signal_type": signal_type,
            "side": order.side.as_str(),
            "qty": order.quantity,
            "price": order.fill_price,
            "urgency": signal.urgency,
            "strategy_id": order.strategy_id,
        });
        if outcome == LedgerOutcome::Closed {
            if let Some(trade) = self.ledger.closed_trades().last() {
                details["pnl"] = json!(trade.pnl);
                details["commission"] = json!(trade.commission);
            }
        }
        self.audit_events.push(AuditEvent {
            run_id: self.run_id.clone(),
            timestamp: order.timestamp,
            stage: stage.to_string(),
            symbol: Some(order.symbol.clone()),
            action: outcome.as_str().to_string(),
            error: None,
            details,
        });
    }

    fn liquidate(&mut self) {
        let Some(last_tick) = self.last_tick.as_ref() else {
            return;
        };
        let tracker = &self.tracker;
        let closed = self.ledger.liquidate(
            last_tick.timestamp,
            |symbol| tracker.last_price(symbol),
            last_tick.price,
        );
        if closed == 0 {
            return;
        }

        tracing::info!(run_id = %self.run_id, closed, "force-closed open trades at end of run");
        let trades: Vec<&Trade> = self.ledger.closed_trades().collect();
        for trade in trades.iter().rev().take(closed).rev() {
            self.audit_events.push(AuditEvent {
                run_id: self.run_id.clone(),
                timestamp: last_tick.timestamp,
                stage: "trade".to_string(),
                symbol: Some(trade.symbol.clone()),
                action: "force_close".to_string(),
                error: None,
                details: json!({
                    "entry_order_id": trade.entry_order_id,
                    "price": trade.exit_price,
                    "pnl": trade.pnl,
                }),
            });
        }
    }

    fn push_complete_event(&mut self) {
        let timestamp = self.last_tick.as_ref().map(|t| t.timestamp).unwrap_or(0);
        tracing::info!(
            run_id = %self.run_id,
            ticks = self.ticks_processed,
            trades = self.ledger.closed_trade_count(),
            cash = self.ledger.cash(),
            "backtest complete"
        );
        self.audit_events.push(AuditEvent {
            run_id: self.run_id.clone(),
            timestamp,
            stage: "engine".to_string(),
            symbol: None,
            action: "complete".to_string(),
            error: None,
            details: json!({
                "ticks_processed": self.ticks_processed,
                "trades": self.ledger.closed_trade_count(),
                "final_cash": self.ledger.cash(),
                "realized_pnl": self.ledger.realized_pnl(),
                "max_drawdown": self.tracker.max_drawdown(),
            }),
        });
    }
}
