use crate::value_objects::order::SimulatedOrder;
use crate::value_objects::signal::SignalType;
use crate::value_objects::trade::{ExitReason, Trade};
use std::collections::BTreeMap;

/// Flat commission per fill plus a notional-proportional part.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommissionModel {
    pub per_fill: f64,
    pub bps: f64,
}

impl CommissionModel {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn commission(&self, notional: f64) -> f64 {
        let per_fill = if self.per_fill.is_finite() {
            self.per_fill.max(0.0)
        } else {
            0.0
        };
        let bps = if self.bps.is_finite() {
            self.bps.max(0.0)
        } else {
            0.0
        };
        per_fill + notional.abs() * bps / 10_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    Opened,
    Closed,
    DuplicateEntry,
    ExitWithoutEntry,
    ZeroQuantity,
}

impl LedgerOutcome {
    pub fn is_noop(self) -> bool {
        !matches!(self, LedgerOutcome::Opened | LedgerOutcome::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LedgerOutcome::Opened => "open",
            LedgerOutcome::Closed => "close",
            LedgerOutcome::DuplicateEntry => "duplicate_entry",
            LedgerOutcome::ExitWithoutEntry => "exit_without_entry",
            LedgerOutcome::ZeroQuantity => "zero_quantity",
        }
    }
}

/// Open and closed trades plus the cash they move.
///
/// Trades live in an append-only arena. `open` maps a symbol to the arena slot
/// of its single open trade; `closed` lists arena slots in close order.
/// Opening a trade reserves `|qty * entry_price| + commission` out of cash;
/// closing it releases the reservation plus the entry commission plus the
/// trade's net P&L, so cash only ever moves by realized P&L across a cycle.
#[derive(Debug, Clone)]
pub struct TradeLedger {
    initial_capital: f64,
    cash: f64,
    commission: CommissionModel,
    trades: Vec<Trade>,
    open: BTreeMap<String, usize>,
    closed: Vec<usize>,
    realized_pnl: f64,
    total_commission: f64,
}

impl TradeLedger {
    pub fn new(initial_capital: f64, commission: CommissionModel) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            commission,
            trades: Vec::new(),
            open: BTreeMap::new(),
            closed: Vec::new(),
            realized_pnl: 0.0,
            total_commission: 0.0,
        }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Cash not tied up in open trades.
    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    pub fn is_open(&self, symbol: &str) -> bool {
        self.open.contains_key(symbol)
    }

    pub fn open_trade(&self, symbol: &str) -> Option<&Trade> {
        self.open.get(symbol).map(|idx| &self.trades[*idx])
    }

    pub fn open_trade_count(&self) -> usize {
        self.open.len()
    }

    /// Open trades ordered by symbol.
    pub fn open_trades(&self) -> impl Iterator<Item = &Trade> {
        self.open.values().map(move |idx| &self.trades[*idx])
    }

    /// Closed trades in the order they were closed.
    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.closed.iter().map(move |idx| &self.trades[*idx])
    }

    pub fn closed_trade_count(&self) -> usize {
        self.closed.len()
    }

    pub fn apply_fill(&mut self, signal_type: SignalType, order: &SimulatedOrder) -> LedgerOutcome {
        match signal_type {
            SignalType::Entry => self.open_trade_from(order),
            SignalType::Exit => {
                let Some(idx) = self.open.remove(&order.symbol) else {
                    return LedgerOutcome::ExitWithoutEntry;
                };
                let exit_commission = self.commission.commission(order.notional());
                self.close_slot(
                    idx,
                    order.timestamp,
                    order.fill_price,
                    exit_commission,
                    Some(order.order_id),
                    ExitReason::Signal,
                );
                LedgerOutcome::Closed
            }
        }
    }

    /// Force-closes every open trade without commission. `price_of` supplies
    /// the last known price per symbol; `fallback_price` covers symbols that
    /// never printed. Returns how many trades were closed.
    pub fn liquidate<F>(&mut self, timestamp: i64, price_of: F, fallback_price: f64) -> usize
    where
        F: Fn(&str) -> Option<f64>,
    {
        let open = std::mem::take(&mut self.open);
        let count = open.len();
        for (symbol, idx) in open {
            let price = price_of(&symbol).unwrap_or(fallback_price);
            self.close_slot(idx, timestamp, price, 0.0, None, ExitReason::EndOfRun);
        }
        count
    }

    fn open_trade_from(&mut self, order: &SimulatedOrder) -> LedgerOutcome {
        if self.open.contains_key(&order.symbol) {
            return LedgerOutcome::DuplicateEntry;
        }
        if !order.quantity.is_finite() || order.quantity <= 0.0 {
            return LedgerOutcome::ZeroQuantity;
        }

        let notional = order.notional();
        let commission = self.commission.commission(notional);
        self.cash -= notional + commission;
        self.total_commission += commission;

        self.trades.push(Trade {
            symbol: order.symbol.clone(),
            strategy_id: order.strategy_id.clone(),
            entry_order_id: order.order_id,
            exit_order_id: None,
            entry_time: order.timestamp,
            exit_time: None,
            entry_price: order.fill_price,
            exit_price: None,
            signed_quantity: order.quantity * order.side.sign(),
            commission,
            pnl: None,
            exit_reason: None,
        });
        self.open
            .insert(order.symbol.clone(), self.trades.len() - 1);
        LedgerOutcome::Opened
    }

    fn close_slot(
        &mut self,
        idx: usize,
        timestamp: i64,
        exit_price: f64,
        exit_commission: f64,
        exit_order_id: Option<u64>,
        reason: ExitReason,
    ) {
        let trade = &mut self.trades[idx];
        let entry_commission = trade.commission;
        trade.commission += exit_commission;
        let pnl = trade.unrealized_pnl(exit_price) - trade.commission;

        trade.exit_time = Some(timestamp);
        trade.exit_price = Some(exit_price);
        trade.exit_order_id = exit_order_id;
        trade.pnl = Some(pnl);
        trade.exit_reason = Some(reason);

        self.cash += trade.reserved_notional() + entry_commission + pnl;
        self.realized_pnl += pnl;
        self.total_commission += exit_commission;
        self.closed.push(idx);
    }
}
