use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use estate_gate::GateError;
use estate_saga::SagaError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Saga(#[from] SagaError),

    #[error(transparent)]
    Admission(#[from] GateError),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("store error: {0}")]
    Store(#[from] estate_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Saga(SagaError::ValidationFailed(errors)) => {
                (StatusCode::BAD_REQUEST, json!({ "errors": errors }))
            }
            Self::Saga(SagaError::Unauthorized) => (
                StatusCode::UNAUTHORIZED,
                json!({ "message": "Authentication required" }),
            ),
            Self::Saga(e @ SagaError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, json!({ "message": e.to_string() }))
            }
            Self::Saga(e) => {
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, json!({ "error": e.to_string() }))
            }
            Self::Admission(e) => (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
            Self::UnknownCollection(_) => {
                (StatusCode::NOT_FOUND, json!({ "message": self.to_string() }))
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::Store(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(body)).into_response()
    }
}
