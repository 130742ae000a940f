use crate::value_objects::order::{OrderStatus, SimulatedOrder};
use crate::value_objects::side::Side;
use crate::value_objects::signal::Signal;
use crate::value_objects::tick::Tick;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionConfig {
    /// Urgency at or above which a signal fills as a market order.
    pub market_urgency: u32,
    /// Minor units per price unit for `Signal::suggested_price`.
    pub price_scale: f64,
    /// Upper bound of the slippage draw, as a fraction of the base price.
    pub max_slippage_pct: f64,
    pub seed: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            market_urgency: 100,
            price_scale: 100.0,
            max_slippage_pct: 0.001,
            seed: 0,
        }
    }
}

/// Turns signals into immediately filled orders.
///
/// Market fills (urgency at or above the threshold) take the tick price.
/// Everything else starts from the signal's suggested price and moves against
/// the trader by a uniform draw in `[0, max_slippage_pct]` of that price.
#[derive(Debug, Clone)]
pub struct ExecutionSimulator {
    config: ExecutionConfig,
    rng: ChaCha8Rng,
    next_order_id: u64,
}

impl ExecutionSimulator {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            next_order_id: 1,
        }
    }

    pub fn orders_filled(&self) -> u64 {
        self.next_order_id - 1
    }

    pub fn fill(&mut self, signal: &Signal, tick: &Tick) -> SimulatedOrder {
        let side = Side::from_strength(signal.signal_strength);
        let fill_price = if signal.urgency >= self.config.market_urgency {
            tick.price
        } else {
            let base = self.limit_base(signal, tick);
            base + side.sign() * self.slippage(base)
        };

        let order_id = self.next_order_id;
        self.next_order_id += 1;

        SimulatedOrder {
            order_id,
            timestamp: tick.timestamp,
            symbol: signal.symbol.clone(),
            strategy_id: signal.strategy_id.clone(),
            quantity: signal.suggested_quantity.abs(),
            side,
            status: OrderStatus::Filled,
            fill_price,
        }
    }

    fn limit_base(&self, signal: &Signal, tick: &Tick) -> f64 {
        if signal.suggested_price > 0 && self.config.price_scale > 0.0 {
            signal.suggested_price as f64 / self.config.price_scale
        } else {
            tick.price
        }
    }

    fn slippage(&mut self, base: f64) -> f64 {
        let max = self.config.max_slippage_pct;
        if max.is_nan() || max <= 0.0 {
            return 0.0;
        }
        let pct: f64 = self.rng.gen_range(0.0..=max);
        pct * base.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionConfig, ExecutionSimulator};
    use crate::value_objects::side::Side;
    use crate::value_objects::signal::{Signal, SignalType};
    use crate::value_objects::tick::Tick;

    fn tick(price: f64) -> Tick {
        Tick {
            timestamp: 77,
            symbol: "AAPL".to_string(),
            price,
            volume: 1_000.0,
            bid: price - 0.01,
            ask: price + 0.01,
        }
    }

    fn signal(strength: f64, qty: f64, price_minor: i64, urgency: u32) -> Signal {
        Signal {
            timestamp: 77,
            symbol: "AAPL".to_string(),
            strategy_id: "s".to_string(),
            signal_strength: strength,
            confidence: 1.0,
            suggested_quantity: qty,
            suggested_price: price_minor,
            urgency,
            signal_type: SignalType::Entry,
        }
    }

    #[test]
    fn market_urgency_fills_at_tick_price() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::default());
        let order = sim.fill(&signal(1.0, 100.0, 0, 100), &tick(101.5));
        assert_eq!(order.fill_price, 101.5);
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.order_id, 1);
        assert_eq!(order.timestamp, 77);
    }

    #[test]
    fn limit_buy_slips_up_and_sell_slips_down() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::default());
        for _ in 0..50 {
            let buy = sim.fill(&signal(0.5, 1.0, 10_000, 10), &tick(120.0));
            assert!(buy.fill_price >= 100.0 && buy.fill_price <= 100.1 + 1e-12);

            let sell = sim.fill(&signal(-0.5, 1.0, 10_000, 10), &tick(120.0));
            assert_eq!(sell.side, Side::Sell);
            assert!(sell.fill_price <= 100.0 && sell.fill_price >= 99.9 - 1e-12);
        }
    }

    #[test]
    fn non_positive_suggested_price_falls_back_to_tick() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::default());
        let order = sim.fill(&signal(1.0, 1.0, 0, 0), &tick(50.0));
        assert!(order.fill_price >= 50.0 && order.fill_price <= 50.05 + 1e-12);
    }

    #[test]
    fn quantity_is_absolute_and_zero_strength_sells() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::default());
        let order = sim.fill(&signal(0.0, -3.0, 0, 100), &tick(10.0));
        assert_eq!(order.quantity, 3.0);
        assert_eq!(order.side, Side::Sell);
    }

    #[test]
    fn order_ids_are_monotonic_from_one() {
        let mut sim = ExecutionSimulator::new(ExecutionConfig::default());
        let ids: Vec<u64> = (0..5)
            .map(|_| sim.fill(&signal(1.0, 1.0, 0, 100), &tick(1.0)).order_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(sim.orders_filled(), 5);
    }

    #[test]
    fn same_seed_same_fills() {
        let config = ExecutionConfig {
            seed: 9,
            ..ExecutionConfig::default()
        };
        let mut a = ExecutionSimulator::new(config);
        let mut b = ExecutionSimulator::new(config);
        for _ in 0..20 {
            let sig = signal(1.0, 1.0, 12_345, 1);
            assert_eq!(
                a.fill(&sig, &tick(1.0)).fill_price,
                b.fill(&sig, &tick(1.0)).fill_price
            );
        }
    }
}
