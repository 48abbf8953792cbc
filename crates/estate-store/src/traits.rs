use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use estate_types::Locator;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::address::AssetPath;
use crate::error::{StoreError, StoreResult};
use crate::locator::LocatorCodec;

/// Tags recorded alongside every stored asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMeta {
    /// Owning entity; empty if the upload was not namespaced.
    pub entity_id: String,
    /// Entity field the upload was made for.
    pub field: String,
    pub folder: String,
    pub original_name: String,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One upload in a bulk [`BlobStore::put_many`] call.
#[derive(Clone, Debug)]
pub struct PutItem {
    pub bytes: Bytes,
    pub path: AssetPath,
    pub meta: AssetMeta,
}

/// Outcome of a best-effort bulk delete.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Locators that are now absent (deleted, already gone, or unresolvable).
    pub deleted: usize,
    /// Locators whose delete failed, with the error rendered for logging.
    pub failed: Vec<(Locator, String)>,
}

impl DeleteReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Blob store adapter.
///
/// Implementations provide the four path-level primitives; locator handling,
/// bulk upload and best-effort deletion are provided on top of them.
///
/// All implementations must satisfy these invariants:
/// - `put` is safe to call concurrently for distinct paths.
/// - `remove` of a missing path returns `Ok(false)`, never an error.
/// - `locator` and `resolve` are inverse for every path the store writes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write bytes at `path` and return its public locator.
    async fn put(&self, bytes: Bytes, path: &AssetPath, meta: &AssetMeta) -> StoreResult<Locator>;

    /// Whether an object is stored at `path`.
    async fn exists(&self, path: &AssetPath) -> StoreResult<bool>;

    /// Remove the object at `path`. Returns `true` if it existed.
    async fn remove(&self, path: &AssetPath) -> StoreResult<bool>;

    /// Locator encoding used by this store.
    fn codec(&self) -> &LocatorCodec;

    fn locator_for(&self, path: &AssetPath) -> Locator {
        self.codec().locator(path)
    }

    fn resolve(&self, locator: &Locator) -> Option<AssetPath> {
        self.codec().resolve(locator)
    }

    /// Issue every put concurrently.
    ///
    /// Returns the locators in input order, or the first error (in input
    /// order) wrapped in [`StoreError::PartialUpload`] together with every
    /// locator that succeeded. Successful uploads are never rolled back here.
    async fn put_many(&self, items: Vec<PutItem>) -> StoreResult<Vec<Locator>> {
        let results = join_all(
            items
                .iter()
                .map(|item| self.put(item.bytes.clone(), &item.path, &item.meta)),
        )
        .await;

        let mut uploaded = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(locator) => uploaded.push(locator),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => tracing::debug!(error = %e, "additional upload failure in batch"),
            }
        }

        match first_error {
            None => Ok(uploaded),
            Some(source) => Err(StoreError::PartialUpload {
                uploaded,
                source: Box::new(source),
            }),
        }
    }

    /// Delete the object behind `locator`.
    ///
    /// Blank, malformed, foreign and already-deleted locators are a silent
    /// no-op. Only a failure to talk to the backend is an error.
    async fn delete(&self, locator: &Locator) -> StoreResult<()> {
        let Some(path) = self.resolve(locator) else {
            tracing::debug!(locator = %locator, "locator does not resolve; nothing to delete");
            return Ok(());
        };
        if !self.exists(&path).await? {
            tracing::debug!(path = %path, "asset already absent");
            return Ok(());
        }
        self.remove(&path).await?;
        tracing::debug!(path = %path, "asset deleted");
        Ok(())
    }

    /// Best-effort concurrent delete. Failures are logged and reported, never
    /// raised.
    async fn delete_many(&self, locators: &[Locator]) -> DeleteReport {
        let results = join_all(locators.iter().map(|l| self.delete(l))).await;
        let mut report = DeleteReport::default();
        for (locator, result) in locators.iter().zip(results) {
            match result {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    tracing::warn!(locator = %locator, error = %e, "asset delete failed");
                    report.failed.push((locator.clone(), e.to_string()));
                }
            }
        }
        report
    }
}
