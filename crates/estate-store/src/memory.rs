use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use estate_types::Locator;

use crate::address::AssetPath;
use crate::error::{StoreError, StoreResult};
use crate::locator::LocatorCodec;
use crate::traits::{AssetMeta, BlobStore};

/// An object held by [`InMemoryBlobStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Bytes,
    pub meta: AssetMeta,
}

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Objects are held behind a `RwLock` for
/// safe concurrent access.
pub struct InMemoryBlobStore {
    codec: LocatorCodec,
    objects: RwLock<HashMap<AssetPath, StoredBlob>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::with_codec(LocatorCodec::default())
    }

    pub fn with_codec(codec: LocatorCodec) -> Self {
        Self {
            codec,
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Fetch an object by path.
    pub fn get(&self, path: &AssetPath) -> Option<StoredBlob> {
        self.objects.read().expect("lock poisoned").get(path).cloned()
    }

    /// Whether the object behind `locator` is currently stored.
    pub fn holds(&self, locator: &Locator) -> bool {
        self.codec
            .resolve(locator)
            .map(|p| self.objects.read().expect("lock poisoned").contains_key(&p))
            .unwrap_or(false)
    }

    /// Sorted list of every stored path.
    pub fn paths(&self) -> Vec<AssetPath> {
        let map = self.objects.read().expect("lock poisoned");
        let mut paths: Vec<AssetPath> = map.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bytes: Bytes, path: &AssetPath, meta: &AssetMeta) -> StoreResult<Locator> {
        if !path.is_contained() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(
            path.clone(),
            StoredBlob {
                bytes,
                meta: meta.clone(),
            },
        );
        Ok(self.locator_for(path))
    }

    async fn exists(&self, path: &AssetPath) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(path))
    }

    async fn remove(&self, path: &AssetPath) -> StoreResult<bool> {
        let mut map = self.objects.write().expect("lock poisoned");
        Ok(map.remove(path).is_some())
    }

    fn codec(&self) -> &LocatorCodec {
        &self.codec
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("bucket", &self.codec.bucket())
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PutItem;
    use chrono::Utc;

    fn meta(field: &str) -> AssetMeta {
        AssetMeta {
            entity_id: "e1".into(),
            field: field.into(),
            folder: "ProjectImages".into(),
            original_name: "a.png".into(),
            content_type: "image/png".into(),
            uploaded_at: Utc::now(),
        }
    }

    fn item(path: &str) -> PutItem {
        PutItem {
            bytes: Bytes::from_static(b"img"),
            path: AssetPath::new(path),
            meta: meta("images"),
        }
    }

    #[tokio::test]
    async fn put_then_resolve() {
        let store = InMemoryBlobStore::new();
        let path = AssetPath::new("ProjectImages/e1/a.png");
        let loc = store.put(Bytes::from_static(b"x"), &path, &meta("images")).await.unwrap();
        assert!(store.holds(&loc));
        assert_eq!(store.get(&path).unwrap().bytes, Bytes::from_static(b"x"));
        assert_eq!(store.get(&path).unwrap().meta.content_type, "image/png");
    }

    #[tokio::test]
    async fn put_rejects_escaping_path() {
        let store = InMemoryBlobStore::new();
        let err = store
            .put(Bytes::new(), &AssetPath::new("../x"), &meta("images"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn put_many_preserves_order() {
        let store = InMemoryBlobStore::new();
        let locs = store
            .put_many(vec![item("a/1.png"), item("a/2.png"), item("a/3.png")])
            .await
            .unwrap();
        assert_eq!(locs.len(), 3);
        assert!(locs[0].as_str().ends_with("a/1.png"));
        assert!(locs[2].as_str().ends_with("a/3.png"));
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn put_many_reports_partial_success() {
        let store = InMemoryBlobStore::new();
        let err = store
            .put_many(vec![item("a/1.png"), item("../bad"), item("a/3.png")])
            .await
            .unwrap_err();
        assert_eq!(err.uploaded().len(), 2);
        assert!(matches!(err, StoreError::PartialUpload { .. }));
        // Nothing was rolled back.
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryBlobStore::new();
        let loc = store
            .put(Bytes::from_static(b"x"), &AssetPath::new("f/x.png"), &meta("images"))
            .await
            .unwrap();
        store.delete(&loc).await.unwrap();
        assert!(!store.holds(&loc));
        store.delete(&loc).await.unwrap();
        store.delete(&Locator::from("https://storage.googleapis.com/estate-assets/never/was.png"))
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_ignores_blank_and_malformed() {
        let store = InMemoryBlobStore::new();
        store.delete(&Locator::from("")).await.unwrap();
        store.delete(&Locator::from("not a url ../..")).await.unwrap();
    }

    #[tokio::test]
    async fn delete_many_counts() {
        let store = InMemoryBlobStore::new();
        let locs = store
            .put_many(vec![item("a/1.png"), item("a/2.png")])
            .await
            .unwrap();
        let mut all = locs.clone();
        all.push(Locator::from(""));
        let report = store.delete_many(&all).await;
        assert_eq!(report.deleted, 3);
        assert!(report.is_clean());
        assert!(store.is_empty());
    }

    #[test]
    fn debug_format() {
        let store = InMemoryBlobStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryBlobStore"));
        assert!(debug.contains("object_count"));
    }
}
