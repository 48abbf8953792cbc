use estate_types::Locator;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached at all.
    #[error("blob store unavailable: {0}")]
    Unavailable(String),

    /// The backend was reached but refused or failed the write.
    #[error("write to {path} failed: {reason}")]
    WriteFailed { path: String, reason: String },

    /// A bulk upload failed part-way. `uploaded` holds every locator that
    /// did land; nothing has been rolled back.
    #[error("bulk upload failed after {} of its uploads succeeded: {source}", uploaded.len())]
    PartialUpload {
        uploaded: Vec<Locator>,
        #[source]
        source: Box<StoreError>,
    },

    /// A path escaped the store root or was otherwise unusable.
    #[error("invalid asset path: {0}")]
    InvalidPath(String),

    /// Sidecar metadata could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Locators that were written before this error, if any.
    pub fn uploaded(&self) -> &[Locator] {
        match self {
            Self::PartialUpload { uploaded, .. } => uploaded,
            _ => &[],
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
