use crate::value_objects::side::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Filled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedOrder {
    pub order_id: u64,
    pub timestamp: i64,
    pub symbol: String,
    pub strategy_id: String,
    pub quantity: f64,
    pub side: Side,
    pub status: OrderStatus,
    pub fill_price: f64,
}

impl SimulatedOrder {
    pub fn notional(&self) -> f64 {
        (self.quantity * self.fill_price).abs()
    }
}
