//! Write orchestrator for asset-backed entities.
//!
//! An entity's metadata record and its binary assets live in two stores with
//! no shared transaction. This crate keeps them consistent with a
//! forward-only saga and explicit compensation:
//!
//! - **create**: reserve a record id, upload assets field by field in
//!   descriptor order, validate the merged document, require an identity,
//!   commit. Any failure before commit deletes this request's uploads and the
//!   reserved record.
//! - **update**: load the record, resolve each asset field (removals,
//!   new uploads, carry-over) concurrently, validate, require an identity,
//!   commit, then delete replaced and removed assets in the background.
//!
//! A committed document never references a blob that did not exist at
//! commit time. Compensation and cleanup are best-effort: a failed delete
//! leaves an orphaned blob, never a dangling reference.
//!
//! Every call takes a [`CancellationToken`](tokio_util::sync::CancellationToken).
//! It is checked before each forward step; a cancelled write compensates
//! exactly like a failed one. Once commit starts the token is ignored.

pub mod descriptor;
pub mod error;
pub mod intent;
pub mod orchestrator;
pub mod request;

pub use descriptor::{AssetFieldSpec, EntityDescriptor};
pub use error::{SagaError, SagaResult};
pub use intent::WriteIntent;
pub use orchestrator::{CleanupHandle, Orchestrator, UpdateOutcome};
pub use request::{AdmittedFile, WriteRequest};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use estate_records::{InMemoryMetadataStore, MetadataStore, RecordError, RecordResult};
    use estate_store::{
        AssetMeta, AssetPath, BlobStore, InMemoryBlobStore, LocatorCodec, StoreError, StoreResult,
    };
    use estate_types::{AssetValue, EntityId, EntityKind, FieldCatalog, FieldMap, Locator};
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    use super::*;

    // -----------------------------------------------------------------------
    // Fault-injecting stores
    // -----------------------------------------------------------------------

    /// Blob store that refuses any upload whose original name starts with
    /// `fail`, and optionally every removal.
    #[derive(Default)]
    struct FlakyBlobStore {
        inner: InMemoryBlobStore,
        /// Puts attempted, including refused ones.
        puts: AtomicUsize,
        fail_removes: AtomicBool,
        /// Cancelled as soon as any put lands.
        cancel_on_put: Option<CancellationToken>,
    }

    #[async_trait]
    impl BlobStore for FlakyBlobStore {
        async fn put(&self, bytes: Bytes, path: &AssetPath, meta: &AssetMeta) -> StoreResult<Locator> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if meta.original_name.starts_with("fail") {
                return Err(StoreError::Unavailable("quota exceeded".into()));
            }
            let loc = self.inner.put(bytes, path, meta).await?;
            if let Some(token) = &self.cancel_on_put {
                token.cancel();
            }
            Ok(loc)
        }

        async fn exists(&self, path: &AssetPath) -> StoreResult<bool> {
            self.inner.exists(path).await
        }

        async fn remove(&self, path: &AssetPath) -> StoreResult<bool> {
            if self.fail_removes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("delete refused".into()));
            }
            self.inner.remove(path).await
        }

        fn codec(&self) -> &LocatorCodec {
            self.inner.codec()
        }
    }

    /// Metadata store whose creates or updates can be made to fail.
    #[derive(Default)]
    struct FlakyMetadataStore {
        inner: InMemoryMetadataStore,
        fail_creates: AtomicBool,
        fail_updates: AtomicBool,
    }

    #[async_trait]
    impl MetadataStore for FlakyMetadataStore {
        async fn create(&self, collection: &str, doc: FieldMap) -> RecordResult<EntityId> {
            if self.fail_creates.load(Ordering::SeqCst) {
                return Err(RecordError::Unavailable("connection refused".into()));
            }
            self.inner.create(collection, doc).await
        }

        async fn get(&self, collection: &str, id: &EntityId) -> RecordResult<Option<FieldMap>> {
            self.inner.get(collection, id).await
        }

        async fn update(&self, collection: &str, id: &EntityId, doc: FieldMap) -> RecordResult<()> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(RecordError::Unavailable("connection reset".into()));
            }
            self.inner.update(collection, id, doc).await
        }

        async fn delete(&self, collection: &str, id: &EntityId) -> RecordResult<()> {
            self.inner.delete(collection, id).await
        }

        async fn list(&self, collection: &str) -> RecordResult<Vec<(EntityId, FieldMap)>> {
            self.inner.list(collection).await
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    const ACTOR: &str = "sales@acredge.in";

    struct Fixture {
        saga: Orchestrator,
        blobs: Arc<FlakyBlobStore>,
        records: Arc<FlakyMetadataStore>,
    }

    fn fixture_with(blobs: FlakyBlobStore) -> Fixture {
        let blobs = Arc::new(blobs);
        let records = Arc::new(FlakyMetadataStore::default());
        let saga = Orchestrator::new(blobs.clone(), records.clone(), FieldCatalog::default());
        Fixture { saga, blobs, records }
    }

    fn fixture() -> Fixture {
        fixture_with(FlakyBlobStore::default())
    }

    fn body(v: Value) -> FieldMap {
        v.as_object().cloned().unwrap()
    }

    fn png(field: &str, name: &str) -> AdmittedFile {
        AdmittedFile::new(field, name, "image/png", Bytes::from(name.as_bytes().to_vec()))
    }

    fn live() -> CancellationToken {
        CancellationToken::new()
    }

    fn locators(v: &Value) -> Vec<Locator> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|l| Locator::from(l.as_str().unwrap()))
            .collect()
    }

    async fn create_series_with_two_images(f: &Fixture) -> estate_types::Entity {
        let req = WriteRequest::new(body(json!({"name": "S1", "towerId": "t1"})))
            .with_file(png("insideImagesUrls", "living.png"))
            .with_file(png("insideImagesUrls", "kitchen.png"))
            .with_actor(ACTOR);
        f.saga.create(EntityKind::Series, req, &live()).await.unwrap()
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn tower_create_without_files() {
        let f = fixture();
        let req = WriteRequest::new(body(json!({"name": "Tower A", "projectId": "p1"})))
            .with_actor(ACTOR);
        let tower = f.saga.create(EntityKind::Tower, req, &live()).await.unwrap();

        assert_eq!(tower.audit.created_by.as_deref(), Some(ACTOR));
        assert!(tower.audit.updated_by.is_none());
        assert!(tower.audit.updated_on.is_none());

        let json = tower.to_json();
        assert_eq!(json["updatedBy"], Value::Null);
        assert_eq!(json["updatedOn"], Value::Null);
        assert!(json["createdOn"].is_string());

        let stored = f.saga.get(EntityKind::Tower, &tower.id).await.unwrap();
        assert_eq!(stored, tower);
    }

    #[tokio::test]
    async fn project_validation_failure_leaves_nothing_behind() {
        let f = fixture();
        let req = WriteRequest::new(body(json!({"developerId": "d1"})))
            .with_file(png("images", "a.png"))
            .with_file(png("images", "b.png"))
            .with_actor(ACTOR);
        let err = f.saga.create(EntityKind::Project, req, &live()).await.unwrap_err();

        let SagaError::ValidationFailed(errors) = &err else {
            panic!("expected validation failure, got {err:?}");
        };
        assert!(!errors.is_empty());
        assert_eq!(errors[0].field, "name");
        assert_eq!(err.status_code(), 400);
        assert!(f.saga.list(EntityKind::Project).await.unwrap().is_empty());
        assert!(f.blobs.inner.is_empty());
    }

    #[tokio::test]
    async fn upload_failure_compensates_earlier_fields() {
        let f = fixture();
        let req = WriteRequest::new(body(json!({"name": "P", "developerId": "d1"})))
            .with_file(png("images", "a.png"))
            .with_file(AdmittedFile::new("videos", "ok.mp4", "video/mp4", Bytes::from_static(b"v")))
            .with_file(AdmittedFile::new("videos", "fail.mp4", "video/mp4", Bytes::from_static(b"v")))
            .with_file(AdmittedFile::new(
                "brochureUrl",
                "b.pdf",
                "application/pdf",
                Bytes::from_static(b"%PDF"),
            ))
            .with_actor(ACTOR);
        let err = f.saga.create(EntityKind::Project, req, &live()).await.unwrap_err();

        match &err {
            SagaError::UploadFailed { field, reason } => {
                assert_eq!(field, "videos");
                assert!(reason.contains("quota exceeded"));
            }
            other => panic!("expected upload failure, got {other:?}"),
        }
        // images, and the video that did land, are gone; brochure never ran.
        assert!(f.blobs.inner.is_empty());
        assert_eq!(f.records.inner.count("projects"), 0);
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized_and_cleans_up() {
        let f = fixture();
        let req = WriteRequest::new(body(json!({"name": "Dev"})))
            .with_file(png("logoUrl", "logo.png"));
        let err = f.saga.create(EntityKind::Developer, req, &live()).await.unwrap_err();
        assert!(matches!(err, SagaError::Unauthorized));
        assert_eq!(err.status_code(), 401);
        assert!(f.blobs.inner.is_empty());
        assert_eq!(f.records.inner.count("developers"), 0);
    }

    #[tokio::test]
    async fn validation_error_reported_before_missing_identity() {
        let f = fixture();
        let req = WriteRequest::new(body(json!({"projectId": "p"})));
        let err = f.saga.create(EntityKind::Tower, req, &live()).await.unwrap_err();
        assert!(matches!(err, SagaError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn client_values_for_owned_keys_are_ignored() {
        let f = fixture();
        let req = WriteRequest::new(body(json!({
            "name": "Dev",
            "createdBy": "mallory@evil",
            "updatedOn": "2000-01-01T00:00:00Z",
            "logoUrl": "https://evil.example/x.png"
        })))
        .with_actor(ACTOR);
        let dev = f.saga.create(EntityKind::Developer, req, &live()).await.unwrap();
        assert_eq!(dev.audit.created_by.as_deref(), Some(ACTOR));
        assert!(dev.audit.updated_on.is_none());
        assert!(dev.field("logoUrl").is_none());
    }

    #[tokio::test]
    async fn created_assets_are_namespaced_and_tagged() {
        let f = fixture();
        let req = WriteRequest::new(body(json!({"name": "Dev"})))
            .with_file(png("logoUrl", "Brand Logo.PNG"))
            .with_actor(ACTOR);
        let dev = f.saga.create(EntityKind::Developer, req, &live()).await.unwrap();

        let AssetValue::Single(Some(logo)) = dev.asset("logoUrl", false) else {
            panic!("logo not set");
        };
        let path = f.blobs.resolve(&logo).unwrap();
        assert!(path
            .as_str()
            .starts_with(&format!("DeveloperLogo/{}/brand_logo_", dev.id)));
        assert!(path.as_str().ends_with(".png"));
        let stored = f.blobs.inner.get(&path).unwrap();
        assert_eq!(stored.meta.entity_id, dev.id.to_string());
        assert_eq!(stored.meta.field, "logoUrl");
        assert_eq!(stored.meta.original_name, "Brand Logo.PNG");
    }

    #[tokio::test]
    async fn reserve_failure_uploads_nothing() {
        let f = fixture();
        f.records.fail_creates.store(true, Ordering::SeqCst);
        let req = WriteRequest::new(body(json!({"name": "Skyline", "developerId": "d1"})))
            .with_file(png("images", "front.png"))
            .with_file(png("images", "side.png"))
            .with_actor(ACTOR);
        let err = f.saga.create(EntityKind::Project, req, &live()).await.unwrap_err();
        assert!(matches!(err, SagaError::StoreUnavailable(_)));
        assert_eq!(err.status_code(), 500);
        assert_eq!(f.blobs.puts.load(Ordering::SeqCst), 0);
        assert!(f.blobs.inner.is_empty());
        assert_eq!(f.records.inner.count("projects"), 0);
    }

    #[tokio::test]
    async fn commit_failure_is_store_unavailable() {
        let f = fixture();
        f.records.fail_updates.store(true, Ordering::SeqCst);
        let req = WriteRequest::new(body(json!({"name": "T", "projectId": "p"}))).with_actor(ACTOR);
        let err = f.saga.create(EntityKind::Tower, req, &live()).await.unwrap_err();
        assert!(matches!(err, SagaError::StoreUnavailable(_)));
        assert_eq!(err.status_code(), 500);
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cancelled_before_start_reserves_nothing() {
        let f = fixture();
        let token = CancellationToken::new();
        token.cancel();
        let req = WriteRequest::new(body(json!({"name": "T", "projectId": "p"}))).with_actor(ACTOR);
        let err = f.saga.create(EntityKind::Tower, req, &token).await.unwrap_err();
        assert!(matches!(err, SagaError::Cancelled));
        assert_eq!(f.records.inner.count("towers"), 0);
    }

    #[tokio::test]
    async fn cancelled_mid_flight_compensates() {
        let token = CancellationToken::new();
        let f = fixture_with(FlakyBlobStore {
            cancel_on_put: Some(token.clone()),
            ..FlakyBlobStore::default()
        });
        let req = WriteRequest::new(body(json!({"name": "P", "developerId": "d"})))
            .with_file(png("images", "a.png"))
            .with_file(AdmittedFile::new("videos", "v.mp4", "video/mp4", Bytes::from_static(b"v")))
            .with_actor(ACTOR);
        let err = f.saga.create(EntityKind::Project, req, &token).await.unwrap_err();
        assert!(matches!(err, SagaError::Cancelled));
        assert!(f.blobs.inner.is_empty());
        assert_eq!(f.records.inner.count("projects"), 0);
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn update_missing_entity_is_not_found() {
        let f = fixture();
        let req = WriteRequest::new(body(json!({"name": "x"}))).with_actor(ACTOR);
        let err = f
            .saga
            .update(EntityKind::Series, &EntityId::new("ghost"), req, &live())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Series not found");
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn series_remove_one_add_one() {
        let f = fixture();
        let series = create_series_with_two_images(&f).await;
        let before = locators(series.field("insideImagesUrls").unwrap());
        assert_eq!(before.len(), 2);

        let removal = serde_json::to_string(&[before[0].as_str()]).unwrap();
        let req = WriteRequest::new(body(json!({ "deleteInsideImages": removal })))
            .with_file(png("insideImagesUrls", "balcony.png"))
            .with_actor("editor@acredge.in");
        let outcome = f
            .saga
            .update(EntityKind::Series, &series.id, req, &live())
            .await
            .unwrap();

        let after = locators(outcome.entity.field("insideImagesUrls").unwrap());
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[1]);
        assert!(!after.contains(&before[0]));
        assert!(outcome.entity.field("deleteInsideImages").is_none());

        let report = outcome.cleanup.wait().await;
        assert_eq!(report.deleted, 1);
        assert!(!f.blobs.inner.holds(&before[0]));
        assert!(f.blobs.inner.holds(&after[0]));
        assert!(f.blobs.inner.holds(&after[1]));
    }

    #[tokio::test]
    async fn update_stamps_updater_and_keeps_creator() {
        let f = fixture();
        let series = create_series_with_two_images(&f).await;
        let req = WriteRequest::new(body(json!({"name": "S1 renamed"}))).with_actor("editor@x");
        let outcome = f
            .saga
            .update(EntityKind::Series, &series.id, req, &live())
            .await
            .unwrap();
        let audit = &outcome.entity.audit;
        assert_eq!(audit.created_by, series.audit.created_by);
        assert_eq!(audit.created_on, series.audit.created_on);
        assert_eq!(audit.updated_by.as_deref(), Some("editor@x"));
        assert!(audit.updated_on.is_some());
        assert!(!outcome.cleanup.is_scheduled());
    }

    #[tokio::test]
    async fn asset_fields_carry_over_untouched() {
        let f = fixture();
        let series = create_series_with_two_images(&f).await;
        let req = WriteRequest::new(body(json!({"name": "S1b", "insideImagesUrls": []})))
            .with_actor(ACTOR);
        let outcome = f
            .saga
            .update(EntityKind::Series, &series.id, req, &live())
            .await
            .unwrap();
        assert_eq!(
            outcome.entity.field("insideImagesUrls"),
            series.field("insideImagesUrls")
        );
        assert_eq!(outcome.entity.field("towerId"), series.field("towerId"));
        assert_eq!(outcome.entity.field("name"), Some(&json!("S1b")));
    }

    #[tokio::test]
    async fn failed_update_leaves_record_and_assets_unchanged() {
        let f = fixture();
        let series = create_series_with_two_images(&f).await;
        let stored_before = f.records.get("series", &series.id).await.unwrap();
        let blob_paths_before = f.blobs.inner.paths();

        let first = locators(series.field("insideImagesUrls").unwrap())[0].clone();
        let req = WriteRequest::new(body(json!({
            "name": "",
            "deleteInsideImages": [first.as_str()]
        })))
        .with_file(png("insideImagesUrls", "new.png"))
        .with_actor(ACTOR);
        let err = f
            .saga
            .update(EntityKind::Series, &series.id, req, &live())
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::ValidationFailed(_)));

        assert_eq!(f.records.get("series", &series.id).await.unwrap(), stored_before);
        assert_eq!(f.blobs.inner.paths(), blob_paths_before);
    }

    #[tokio::test]
    async fn update_upload_failure_removes_only_new_uploads() {
        let f = fixture();
        let series = create_series_with_two_images(&f).await;
        let blob_paths_before = f.blobs.inner.paths();

        let req = WriteRequest::new(body(json!({"name": "S"})))
            .with_file(png("insideImagesUrls", "ok.png"))
            .with_file(png("layoutPlanUrl", "fail.png"))
            .with_actor(ACTOR);
        let err = f
            .saga
            .update(EntityKind::Series, &series.id, req, &live())
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::UploadFailed { ref field, .. } if field == "layoutPlanUrl"));
        assert_eq!(f.blobs.inner.paths(), blob_paths_before);
    }

    #[tokio::test]
    async fn update_without_identity_removes_new_uploads() {
        let f = fixture();
        let series = create_series_with_two_images(&f).await;
        let blob_paths_before = f.blobs.inner.paths();
        let req = WriteRequest::new(body(json!({"name": "S"})))
            .with_file(png("insideImagesUrls", "new.png"));
        let err = f
            .saga
            .update(EntityKind::Series, &series.id, req, &live())
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::Unauthorized));
        assert_eq!(f.blobs.inner.paths(), blob_paths_before);
    }

    #[tokio::test]
    async fn replacing_single_asset_dooms_the_old_one() {
        let f = fixture();
        let req = WriteRequest::new(body(json!({"name": "Dev"})))
            .with_file(png("logoUrl", "old.png"))
            .with_actor(ACTOR);
        let dev = f.saga.create(EntityKind::Developer, req, &live()).await.unwrap();
        let AssetValue::Single(Some(old)) = dev.asset("logoUrl", false) else {
            panic!("logo not set");
        };

        let req = WriteRequest::new(FieldMap::new())
            .with_file(png("logoUrl", "new.png"))
            .with_actor(ACTOR);
        let outcome = f
            .saga
            .update(EntityKind::Developer, &dev.id, req, &live())
            .await
            .unwrap();
        let AssetValue::Single(Some(new)) = outcome.entity.asset("logoUrl", false) else {
            panic!("logo not set");
        };
        assert_ne!(new, old);
        outcome.cleanup.wait().await;
        assert!(!f.blobs.inner.holds(&old));
        assert!(f.blobs.inner.holds(&new));
    }

    #[tokio::test]
    async fn removals_of_foreign_locators_are_ignored() {
        let f = fixture();
        let victim = create_series_with_two_images(&f).await;
        let attacker = create_series_with_two_images(&f).await;
        let victim_image = locators(victim.field("insideImagesUrls").unwrap())[0].clone();

        let req = WriteRequest::new(body(json!({
            "deleteInsideImages": [victim_image.as_str()]
        })))
        .with_actor(ACTOR);
        let outcome = f
            .saga
            .update(EntityKind::Series, &attacker.id, req, &live())
            .await
            .unwrap();
        outcome.cleanup.wait().await;
        assert!(f.blobs.inner.holds(&victim_image));
        assert_eq!(
            outcome.entity.field("insideImagesUrls"),
            attacker.field("insideImagesUrls")
        );
    }

    #[tokio::test]
    async fn cleanup_failure_does_not_fail_the_update() {
        let f = fixture();
        let series = create_series_with_two_images(&f).await;
        let first = locators(series.field("insideImagesUrls").unwrap())[0].clone();
        f.blobs.fail_removes.store(true, Ordering::SeqCst);

        let req = WriteRequest::new(body(json!({"deleteInsideImages": [first.as_str()]})))
            .with_actor(ACTOR);
        let outcome = f
            .saga
            .update(EntityKind::Series, &series.id, req, &live())
            .await
            .unwrap();
        assert_eq!(
            locators(outcome.entity.field("insideImagesUrls").unwrap()).len(),
            1
        );
        let report = outcome.cleanup.wait().await;
        assert_eq!(report.failed.len(), 1);
        // Orphaned, not dangling.
        assert!(f.blobs.inner.holds(&first));
    }

    #[tokio::test]
    async fn malformed_removal_directive_is_rejected() {
        let f = fixture();
        let series = create_series_with_two_images(&f).await;
        let req = WriteRequest::new(body(json!({"deleteInsideVideos": "{not json"})))
            .with_file(png("insideImagesUrls", "x.png"))
            .with_actor(ACTOR);
        let err = f
            .saga
            .update(EntityKind::Series, &series.id, req, &live())
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::InvalidRequest(_)));
        assert_eq!(f.blobs.inner.len(), 2);
    }

    #[tokio::test]
    async fn list_returns_committed_entities() {
        let f = fixture();
        for name in ["A", "B"] {
            let req = WriteRequest::new(body(json!({"name": name, "projectId": "p"})))
                .with_actor(ACTOR);
            f.saga.create(EntityKind::Tower, req, &live()).await.unwrap();
        }
        let towers = f.saga.list(EntityKind::Tower).await.unwrap();
        assert_eq!(towers.len(), 2);
        assert!(f.saga.list(EntityKind::Developer).await.unwrap().is_empty());
    }
}
