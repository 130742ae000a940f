use crate::entities::ledger::TradeLedger;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::tick::Tick;
use std::collections::BTreeMap;

/// Marks open trades to market once per tick and keeps the running
/// high-water mark and worst peak-to-trough drawdown.
#[derive(Debug, Clone)]
pub struct EquityTracker {
    high_water_mark: f64,
    max_drawdown: f64,
    last_prices: BTreeMap<String, f64>,
    curve: Vec<EquityPoint>,
}

impl EquityTracker {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            high_water_mark: initial_capital,
            max_drawdown: 0.0,
            last_prices: BTreeMap::new(),
            curve: Vec::new(),
        }
    }

    pub fn observe(&mut self, tick: &Tick) {
        if tick.price.is_finite() {
            self.last_prices.insert(tick.symbol.clone(), tick.price);
        }
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.get(symbol).copied()
    }

    /// Appends one equity point: cash plus the reserved value of every open
    /// trade plus its unrealized P&L at that symbol's last price.
    pub fn record(&mut self, timestamp: i64, ledger: &TradeLedger) -> &EquityPoint {
        let mut open_value = 0.0;
        let mut unrealized = 0.0;
        for trade in ledger.open_trades() {
            let mark = self.last_price(&trade.symbol).unwrap_or(trade.entry_price);
            let trade_unrealized = trade.unrealized_pnl(mark);
            open_value += trade.reserved_notional() + trade_unrealized;
            unrealized += trade_unrealized;
        }

        let equity = ledger.cash() + open_value;
        update_drawdown(&mut self.high_water_mark, &mut self.max_drawdown, equity);

        self.curve.push(EquityPoint {
            timestamp,
            equity,
            cash: ledger.cash(),
            open_trades: ledger.open_trade_count(),
            unrealized_pnl: unrealized,
            realized_pnl: ledger.realized_pnl(),
        });
        &self.curve[self.curve.len() - 1]
    }

    pub fn high_water_mark(&self) -> f64 {
        self.high_water_mark
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.curve
    }
}

/// Raises the mark on new highs, otherwise widens the drawdown if the fall
/// from the mark is the deepest seen.
pub fn update_drawdown(high_water_mark: &mut f64, max_drawdown: &mut f64, equity: f64) {
    if equity > *high_water_mark {
        *high_water_mark = equity;
    } else if *high_water_mark > 0.0 {
        let drawdown = (*high_water_mark - equity) / *high_water_mark;
        if drawdown > *max_drawdown {
            *max_drawdown = drawdown;
        }
    }
}

/// Replays an equity curve from `initial_capital`, returning the final
/// high-water mark and max drawdown.
pub fn replay_drawdown(initial_capital: f64, curve: &[EquityPoint]) -> (f64, f64) {
    let mut hwm = initial_capital;
    let mut mdd = 0.0;
    for point in curve {
        update_drawdown(&mut hwm, &mut mdd, point.equity);
    }
    (hwm, mdd)
}
