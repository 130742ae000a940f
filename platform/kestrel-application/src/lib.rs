pub mod backtesting;
pub mod config;
pub mod generation;
pub mod meta;
pub mod reporting;
mod shared;
pub mod validation;
