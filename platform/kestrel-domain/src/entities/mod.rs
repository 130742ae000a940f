pub mod equity;
pub mod ledger;
pub mod metrics;
