use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use estate_types::{EntityId, FieldMap};

use crate::error::{RecordError, RecordResult};
use crate::traits::MetadataStore;

/// In-memory document store for tests, local runs, and embedding.
pub struct InMemoryMetadataStore {
    collections: RwLock<HashMap<String, BTreeMap<EntityId, FieldMap>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .expect("lock poisoned")
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create(&self, collection: &str, doc: FieldMap) -> RecordResult<EntityId> {
        let id = EntityId::generate();
        let mut map = self.collections.write().expect("lock poisoned");
        map.entry(collection.to_owned())
            .or_default()
            .insert(id.clone(), doc);
        tracing::debug!(collection, id = %id, "record created");
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &EntityId) -> RecordResult<Option<FieldMap>> {
        let map = self.collections.read().expect("lock poisoned");
        Ok(map.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn update(&self, collection: &str, id: &EntityId, doc: FieldMap) -> RecordResult<()> {
        let mut map = self.collections.write().expect("lock poisoned");
        let existing = map
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| RecordError::NotFound {
                collection: collection.to_owned(),
                id: id.to_string(),
            })?;
        existing.extend(doc);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &EntityId) -> RecordResult<()> {
        let mut map = self.collections.write().expect("lock poisoned");
        if let Some(c) = map.get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> RecordResult<Vec<(EntityId, FieldMap)>> {
        let map = self.collections.read().expect("lock poisoned");
        Ok(map
            .get(collection)
            .map(|c| c.iter().map(|(id, doc)| (id.clone(), doc.clone())).collect())
            .unwrap_or_default())
    }
}

impl std::fmt::Debug for InMemoryMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.collections.read().expect("lock poisoned");
        let mut names: Vec<&String> = map.keys().collect();
        names.sort();
        f.debug_struct("InMemoryMetadataStore")
            .field("collections", &names)
            .finish()
    }
}
