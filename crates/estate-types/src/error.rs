use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown entity kind: {0}")]
    UnknownKind(String),

    #[error("invalid timestamp in '{field}': {value}")]
    InvalidTimestamp { field: String, value: String },
}
