use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    EndOfRun,
}

/// One open-to-close position cycle for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub strategy_id: String,
    pub entry_order_id: u64,
    pub exit_order_id: Option<u64>,
    pub entry_time: i64,
    pub exit_time: Option<i64>,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    /// Positive for long, negative for short.
    pub signed_quantity: f64,
    pub commission: f64,
    pub pnl: Option<f64>,
    pub exit_reason: Option<ExitReason>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    /// Capital set aside when the trade was opened.
    pub fn reserved_notional(&self) -> f64 {
        (self.signed_quantity * self.entry_price).abs()
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.signed_quantity
    }

    pub fn duration_ns(&self) -> Option<i64> {
        self.exit_time.map(|exit| exit - self.entry_time)
    }
}
