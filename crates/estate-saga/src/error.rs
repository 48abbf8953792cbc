use estate_gate::FieldError;
use estate_records::RecordError;
use estate_types::{EntityId, EntityKind, TypeError};

/// Why a write did not commit.
///
/// Every variant raised before commit has already been compensated by the
/// time the caller sees it.
#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    #[error("upload failed for '{field}': {reason}")]
    UploadFailed { field: String, reason: String },

    #[error("validation failed with {} error(s)", .0.len())]
    ValidationFailed(Vec<FieldError>),

    #[error("authentication required")]
    Unauthorized,

    #[error("{kind} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("metadata store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SagaError {
    /// HTTP status the outcome maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UploadFailed { .. } | Self::ValidationFailed(_) | Self::InvalidRequest(_) => 400,
            Self::Unauthorized => 401,
            Self::NotFound { .. } => 404,
            Self::StoreUnavailable(_) => 500,
            // Client closed the request; nobody is left to read the response.
            Self::Cancelled => 499,
        }
    }
}

impl From<RecordError> for SagaError {
    fn from(e: RecordError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<TypeError> for SagaError {
    fn from(e: TypeError) -> Self {
        Self::StoreUnavailable(format!("stored record is malformed: {e}"))
    }
}

pub type SagaResult<T> = Result<T, SagaError>;
