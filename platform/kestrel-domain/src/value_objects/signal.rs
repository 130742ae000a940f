use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Entry,
    Exit,
}

/// A strategy's request to enter or exit a position.
///
/// `signal_strength` carries direction in its sign. `suggested_price` is in
/// minor units (see `ExecutionConfig::price_scale`). Lower `urgency` means a
/// more aggressive order; values at or above the market threshold fill at the
/// tick price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: i64,
    pub symbol: String,
    pub strategy_id: String,
    pub signal_strength: f64,
    pub confidence: f64,
    pub suggested_quantity: f64,
    pub suggested_price: i64,
    pub urgency: u32,
    pub signal_type: SignalType,
}
