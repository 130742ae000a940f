use crate::value_objects::order::SimulatedOrder;
use crate::value_objects::signal::{Signal, SignalType};
use crate::value_objects::tick::Tick;
use std::collections::{BTreeMap, VecDeque};

/// Lifecycle a strategy is driven through by the runner:
/// `start`, then per tick `on_market_data` + `on_tick` + drain `next_signal`
/// (with `on_order_fill` for each resulting order), then `stop`.
pub trait Strategy {
    fn name(&self) -> &str;

    fn start(&mut self) {}

    fn stop(&mut self) {}

    fn on_market_data(&mut self, _tick: &Tick) {}

    fn on_tick(&mut self) {}

    /// Pops the next pending signal, oldest first.
    fn next_signal(&mut self) -> Option<Signal> {
        None
    }

    fn on_order_fill(&mut self, _order: &SimulatedOrder) {}
}

pub struct HoldStrategy;

impl Strategy for HoldStrategy {
    fn name(&self) -> &str {
        "hold"
    }
}

#[derive(Debug, Clone)]
pub struct SmaCrossoverParams {
    pub short_window: usize,
    pub long_window: usize,
    pub quantity: f64,
    pub urgency: u32,
    pub price_scale: f64,
}

impl Default for SmaCrossoverParams {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 20,
            quantity: 100.0,
            urgency: 100,
            price_scale: 100.0,
        }
    }
}

#[derive(Debug, Default)]
struct SymbolState {
    prices: VecDeque<f64>,
    in_position: bool,
}

/// Long-only moving-average crossover, tracked independently per symbol.
/// Enters when the short mean rises above the long mean and exits on the
/// opposite cross. Position state follows fills, not signals.
#[derive(Debug)]
pub struct SmaCrossover {
    params: SmaCrossoverParams,
    symbols: BTreeMap<String, SymbolState>,
    last_tick: Option<Tick>,
    pending: VecDeque<Signal>,
    awaiting_fill: VecDeque<SignalType>,
}

impl SmaCrossover {
    pub fn new(params: SmaCrossoverParams) -> Self {
        Self {
            params,
            symbols: BTreeMap::new(),
            last_tick: None,
            pending: VecDeque::new(),
            awaiting_fill: VecDeque::new(),
        }
    }

    pub fn in_position(&self, symbol: &str) -> bool {
        self.symbols
            .get(symbol)
            .map(|state| state.in_position)
            .unwrap_or(false)
    }

    fn signal(&self, tick: &Tick, signal_type: SignalType) -> Signal {
        let strength = match signal_type {
            SignalType::Entry => 1.0,
            SignalType::Exit => -1.0,
        };
        Signal {
            timestamp: tick.timestamp,
            symbol: tick.symbol.clone(),
            strategy_id: self.name().to_string(),
            signal_strength: strength,
            confidence: 1.0,
            suggested_quantity: self.params.quantity,
            suggested_price: (tick.price * self.params.price_scale).round() as i64,
            urgency: self.params.urgency,
            signal_type,
        }
    }
}

fn mean_of_last(prices: &VecDeque<f64>, window: usize) -> Option<f64> {
    if window == 0 || prices.len() < window {
        return None;
    }
    Some(prices.iter().rev().take(window).sum::<f64>() / window as f64)
}

impl Strategy for SmaCrossover {
    fn name(&self) -> &str {
        "sma_crossover"
    }

    fn on_market_data(&mut self, tick: &Tick) {
        self.last_tick = Some(tick.clone());
    }

    fn on_tick(&mut self) {
        let Some(tick) = self.last_tick.take() else {
            return;
        };
        let long_window = self.params.long_window.max(self.params.short_window);
        let state = self.symbols.entry(tick.symbol.clone()).or_default();
        state.prices.push_back(tick.price);
        while state.prices.len() > long_window {
            state.prices.pop_front();
        }

        let (Some(short), Some(long)) = (
            mean_of_last(&state.prices, self.params.short_window),
            mean_of_last(&state.prices, self.params.long_window),
        ) else {
            return;
        };

        let signal_type = if short > long && !state.in_position {
            SignalType::Entry
        } else if short < long && state.in_position {
            SignalType::Exit
        } else {
            return;
        };
        let signal = self.signal(&tick, signal_type);
        self.pending.push_back(signal);
    }

    fn next_signal(&mut self) -> Option<Signal> {
        let signal = self.pending.pop_front()?;
        self.awaiting_fill.push_back(signal.signal_type);
        Some(signal)
    }

    fn on_order_fill(&mut self, order: &SimulatedOrder) {
        let Some(signal_type) = self.awaiting_fill.pop_front() else {
            return;
        };
        let state = self.symbols.entry(order.symbol.clone()).or_default();
        state.in_position = signal_type == SignalType::Entry;
    }
}

/// Emits a fixed set of signals keyed by tick index (0-based). Each emitted
/// signal takes the current tick's timestamp. Records what it was told.
#[derive(Debug, Default)]
pub struct ScriptedStrategy {
    script: BTreeMap<usize, Vec<Signal>>,
    tick_index: usize,
    current_timestamp: i64,
    pending: VecDeque<Signal>,
    fills: Vec<SimulatedOrder>,
    ticks_seen: usize,
    starts: usize,
    stops: usize,
}

impl ScriptedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, tick_index: usize, signal: Signal) -> Self {
        self.script.entry(tick_index).or_default().push(signal);
        self
    }

    pub fn fills(&self) -> &[SimulatedOrder] {
        &self.fills
    }

    pub fn ticks_seen(&self) -> usize {
        self.ticks_seen
    }

    pub fn starts(&self) -> usize {
        self.starts
    }

    pub fn stops(&self) -> usize {
        self.stops
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn start(&mut self) {
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.stops += 1;
    }

    fn on_market_data(&mut self, tick: &Tick) {
        self.current_timestamp = tick.timestamp;
        self.ticks_seen += 1;
    }

    fn on_tick(&mut self) {
        if let Some(signals) = self.script.remove(&self.tick_index) {
            for mut signal in signals {
                signal.timestamp = self.current_timestamp;
                self.pending.push_back(signal);
            }
        }
        self.tick_index += 1;
    }

    fn next_signal(&mut self) -> Option<Signal> {
        self.pending.pop_front()
    }

    fn on_order_fill(&mut self, order: &SimulatedOrder) {
        self.fills.push(order.clone());
    }
}

pub enum StrategyKind {
    Hold(HoldStrategy),
    SmaCrossover(SmaCrossover),
    Scripted(ScriptedStrategy),
}

impl Strategy for StrategyKind {
    fn name(&self) -> &str {
        match self {
            StrategyKind::Hold(strategy) => strategy.name(),
            StrategyKind::SmaCrossover(strategy) => strategy.name(),
            StrategyKind::Scripted(strategy) => strategy.name(),
        }
    }

    fn start(&mut self) {
        match self {
            StrategyKind::Hold(strategy) => strategy.start(),
            StrategyKind::SmaCrossover(strategy) => strategy.start(),
            StrategyKind::Scripted(strategy) => strategy.start(),
        }
    }

    fn stop(&mut self) {
        match self {
            StrategyKind::Hold(strategy) => strategy.stop(),
            StrategyKind::SmaCrossover(strategy) => strategy.stop(),
            StrategyKind::Scripted(strategy) => strategy.stop(),
        }
    }

    fn on_market_data(&mut self, tick: &Tick) {
        match self {
            StrategyKind::Hold(strategy) => strategy.on_market_data(tick),
            StrategyKind::SmaCrossover(strategy) => strategy.on_market_data(tick),
            StrategyKind::Scripted(strategy) => strategy.on_market_data(tick),
        }
    }

    fn on_tick(&mut self) {
        match self {
            StrategyKind::Hold(strategy) => strategy.on_tick(),
            StrategyKind::SmaCrossover(strategy) => strategy.on_tick(),
            StrategyKind::Scripted(strategy) => strategy.on_tick(),
        }
    }

    fn next_signal(&mut self) -> Option<Signal> {
        match self {
            StrategyKind::Hold(strategy) => strategy.next_signal(),
            StrategyKind::SmaCrossover(strategy) => strategy.next_signal(),
            StrategyKind::Scripted(strategy) => strategy.next_signal(),
        }
    }

    fn on_order_fill(&mut self, order: &SimulatedOrder) {
        match self {
            StrategyKind::Hold(strategy) => strategy.on_order_fill(order),
            StrategyKind::SmaCrossover(strategy) => strategy.on_order_fill(order),
            StrategyKind::Scripted(strategy) => strategy.on_order_fill(order),
        }
    }
}
