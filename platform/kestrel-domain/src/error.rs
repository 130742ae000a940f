use thiserror::Error;

/// Errors raised while loading tick data. Any of these aborts the load.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read tick data {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: missing field `{field}`")]
    MissingField { line: u64, field: &'static str },

    #[error("line {line}: invalid {field} value {value:?}")]
    Parse {
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("invalid generator parameters: {0}")]
    InvalidGenerator(String),
}
