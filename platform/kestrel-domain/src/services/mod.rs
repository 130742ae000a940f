pub mod audit;
pub mod engine;
pub mod market_data_source;
pub mod strategy;
pub mod tick_quality;
