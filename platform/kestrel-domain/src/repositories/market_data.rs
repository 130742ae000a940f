use crate::error::DataError;
use crate::value_objects::tick::Tick;
use std::path::Path;

/// Port for persisted tick files (`timestamp_ns,symbol_id,price,volume,bid,ask`
/// after one header line).
pub trait TickRepository {
    /// Reads every record or fails; a partial read is never returned.
    fn load_ticks(&self, path: &Path) -> Result<Vec<Tick>, DataError>;

    fn save_ticks(&self, path: &Path, ticks: &[Tick]) -> Result<(), DataError>;
}
