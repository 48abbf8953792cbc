use std::sync::Arc;

use estate_gate::AdmissionGate;
use estate_records::{InMemoryMetadataStore, MetadataStore};
use estate_saga::Orchestrator;
use tokio::net::TcpListener;

use crate::auth::ConfiguredIdentity;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Estate HTTP server.
pub struct EstateServer {
    config: ServerConfig,
}

impl EstateServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the stores and build the router (useful for testing).
    pub async fn router(&self) -> ServerResult<axum::Router> {
        let blobs = self.config.blob.open().await?;
        let records: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let catalog = self.config.catalog.clone();
        let state = AppState::new(
            Orchestrator::new(blobs, records, catalog.clone()),
            AdmissionGate::new(catalog),
            Arc::new(ConfiguredIdentity::new(self.config.identity.clone())),
        );
        Ok(build_router(state, self.config.max_body_bytes))
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router().await?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            bind_addr = %self.config.bind_addr,
            backend = ?self.config.blob.backend,
            "estate server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
