pub mod equity_point;
pub mod order;
pub mod side;
pub mod signal;
pub mod tick;
pub mod trade;
