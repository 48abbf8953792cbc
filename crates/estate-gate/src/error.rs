/// Errors raised by the admission gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// An uploaded file was refused before reaching the orchestrator.
    #[error("file rejected for '{field}': {reason}")]
    Admission { field: String, reason: String },
}

impl GateError {
    pub fn admission(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Admission {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field the rejection refers to.
    pub fn field(&self) -> &str {
        match self {
            Self::Admission { field, .. } => field,
        }
    }
}
