use async_trait::async_trait;
use estate_types::{EntityId, FieldMap};

use crate::error::RecordResult;

/// Document store boundary used by the write orchestrator.
///
/// Transport failures surface as [`RecordError::Unavailable`](crate::RecordError::Unavailable)
/// and are propagated unmodified by callers.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new document and return its store-assigned id.
    async fn create(&self, collection: &str, doc: FieldMap) -> RecordResult<EntityId>;

    async fn get(&self, collection: &str, id: &EntityId) -> RecordResult<Option<FieldMap>>;

    /// Merge `doc` into an existing document. Keys in `doc` overwrite, keys
    /// absent from `doc` are kept.
    async fn update(&self, collection: &str, id: &EntityId, doc: FieldMap) -> RecordResult<()>;

    /// Remove a document. Removing a missing document is not an error.
    async fn delete(&self, collection: &str, id: &EntityId) -> RecordResult<()>;

    /// Every document in a collection, ordered by id.
    async fn list(&self, collection: &str) -> RecordResult<Vec<(EntityId, FieldMap)>>;
}
