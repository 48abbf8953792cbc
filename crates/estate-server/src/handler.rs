use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::Json;
use estate_gate::{AdmissionGate, GateError};
use estate_saga::{Orchestrator, SagaResult, WriteRequest};
use estate_types::{EntityId, EntityKind};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::auth::IdentityProvider;
use crate::error::{ServerError, ServerResult};
use crate::multipart::decode_body;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub saga: Arc<Orchestrator>,
    pub gate: Arc<AdmissionGate>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(
        saga: Orchestrator,
        gate: AdmissionGate,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            saga: Arc::new(saga),
            gate: Arc::new(gate),
            identity,
        }
    }
}

fn kind_of(collection: &str) -> ServerResult<EntityKind> {
    EntityKind::from_collection(collection)
        .map_err(|_| ServerError::UnknownCollection(collection.to_owned()))
}

/// Run a saga on its own task.
///
/// If the client goes away the handler future is dropped, the guard cancels
/// the token, and the saga compensates instead of being torn down mid-write.
async fn run_saga<T, F, Fut>(saga: Arc<Orchestrator>, f: F) -> ServerResult<T>
where
    F: FnOnce(Arc<Orchestrator>, CancellationToken) -> Fut,
    Fut: Future<Output = SagaResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();
    tokio::spawn(f(saga, token))
        .await
        .map_err(|e| ServerError::Internal(format!("write task failed: {e}")))?
        .map_err(ServerError::from)
}

/// Build the orchestrator's view of a request: identity, fields, admitted
/// files.
///
/// Files must target an asset field of `kind`; the gate's catalog spans
/// every kind.
async fn write_request(
    state: &AppState,
    kind: EntityKind,
    request: Request,
) -> ServerResult<WriteRequest> {
    let actor = state.identity.identify(request.headers()).await;
    let decoded = decode_body(request).await?;
    let descriptor = state.saga.descriptor(kind)?;
    if let Some(file) = decoded
        .files
        .iter()
        .find(|f| descriptor.asset_field(&f.field).is_none())
    {
        return Err(GateError::admission(file.field.as_str(), "unexpected file field").into());
    }
    state.gate.admit(&decoded.incoming())?;
    Ok(WriteRequest {
        body: decoded.fields,
        files: decoded.files,
        actor,
    })
}

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/:collection`
pub async fn create_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    request: Request,
) -> ServerResult<(StatusCode, Json<Value>)> {
    let kind = kind_of(&collection)?;
    let write = write_request(&state, kind, request).await?;
    let entity = run_saga(state.saga.clone(), move |saga, token| async move {
        saga.create(kind, write, &token).await
    })
    .await?;
    Ok((StatusCode::CREATED, Json(entity.to_json())))
}

/// `PUT /api/:collection/:id`
pub async fn update_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    request: Request,
) -> ServerResult<Json<Value>> {
    let kind = kind_of(&collection)?;
    let id = EntityId::new(id);
    let write = write_request(&state, kind, request).await?;
    let outcome = run_saga(state.saga.clone(), move |saga, token| async move {
        saga.update(kind, &id, write, &token).await
    })
    .await?;
    // Dropping the handle detaches cleanup; the response does not wait on it.
    drop(outcome.cleanup);
    Ok(Json(json!({
        "message": format!("{} updated successfully", kind.display_name()),
        "data": outcome.entity.to_json(),
    })))
}

/// `GET /api/:collection`
pub async fn list_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> ServerResult<Json<Value>> {
    let kind = kind_of(&collection)?;
    let entities = state.saga.list(kind).await?;
    Ok(Json(Value::Array(
        entities.iter().map(|e| e.to_json()).collect(),
    )))
}

/// `GET /api/:collection/:id`
pub async fn get_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ServerResult<Json<Value>> {
    let kind = kind_of(&collection)?;
    let entity = state.saga.get(kind, &EntityId::new(id)).await?;
    Ok(Json(entity.to_json()))
}
