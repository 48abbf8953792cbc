/// Errors produced by metadata store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("record {id} not found in {collection}")]
    NotFound { collection: String, id: String },
}

pub type RecordResult<T> = Result<T, RecordError>;
