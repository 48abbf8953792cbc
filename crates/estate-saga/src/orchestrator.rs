use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use estate_records::MetadataStore;
use estate_store::{AssetAddresser, AssetMeta, BlobStore, DeleteReport, PutItem};
use estate_types::{
    strip_system_keys, AssetValue, AuditStamp, Entity, EntityId, EntityKind, FieldCatalog,
    FieldMap, Locator,
};
use futures::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::descriptor::{AssetFieldSpec, EntityDescriptor};
use crate::error::{SagaError, SagaResult};
use crate::intent::WriteIntent;
use crate::request::{AdmittedFile, WriteRequest};

/// Handle on the post-commit deletion of replaced and removed assets.
///
/// Dropping it detaches the cleanup; it still runs to completion.
#[derive(Debug)]
pub struct CleanupHandle {
    task: Option<JoinHandle<DeleteReport>>,
}

impl CleanupHandle {
    fn none() -> Self {
        Self { task: None }
    }

    /// Whether any cleanup was scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.task.is_some()
    }

    /// Wait for cleanup to finish and return its report.
    pub async fn wait(self) -> DeleteReport {
        match self.task {
            None => DeleteReport::default(),
            Some(task) => task.await.unwrap_or_else(|e| {
                warn!(error = %e, "cleanup task did not complete");
                DeleteReport::default()
            }),
        }
    }
}

/// Result of a committed update.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub entity: Entity,
    pub cleanup: CleanupHandle,
}

/// Per-field result of the update flow's asset phase.
struct FieldOutcome {
    field: &'static str,
    /// `None` means carry the existing value over untouched.
    value: Option<AssetValue>,
    uploaded: Vec<Locator>,
    doomed: Vec<Locator>,
    error: Option<SagaError>,
}

/// The write saga.
///
/// One generic orchestrator serves every entity kind; kind-specific
/// behaviour comes from its [`EntityDescriptor`]. Each call owns a fresh
/// [`WriteIntent`] and shares no mutable state with concurrent calls.
pub struct Orchestrator {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn MetadataStore>,
    addresser: AssetAddresser,
    descriptors: HashMap<EntityKind, EntityDescriptor>,
}

impl Orchestrator {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn MetadataStore>,
        catalog: FieldCatalog,
    ) -> Self {
        let descriptors = EntityKind::ALL
            .into_iter()
            .map(|k| (k, EntityDescriptor::for_kind(k)))
            .collect();
        Self {
            blobs,
            records,
            addresser: AssetAddresser::new(catalog),
            descriptors,
        }
    }

    /// Replace the descriptor used for one kind.
    pub fn with_descriptor(mut self, descriptor: EntityDescriptor) -> Self {
        self.descriptors.insert(descriptor.kind, descriptor);
        self
    }

    pub fn descriptor(&self, kind: EntityKind) -> SagaResult<&EntityDescriptor> {
        self.descriptors
            .get(&kind)
            .ok_or_else(|| SagaError::InvalidRequest(format!("no descriptor for {kind}")))
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn records(&self) -> &Arc<dyn MetadataStore> {
        &self.records
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get(&self, kind: EntityKind, id: &EntityId) -> SagaResult<Entity> {
        let doc = self
            .records
            .get(kind.collection(), id)
            .await
            .map_err(store_down)?
            .ok_or_else(|| SagaError::NotFound {
                kind,
                id: id.clone(),
            })?;
        Ok(Entity::from_document(id.clone(), doc)?)
    }

    pub async fn list(&self, kind: EntityKind) -> SagaResult<Vec<Entity>> {
        let docs = self.records.list(kind.collection()).await.map_err(store_down)?;
        docs.into_iter()
            .map(|(id, doc)| Entity::from_document(id, doc).map_err(SagaError::from))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    /// Reserve, upload, validate, authorize, commit.
    ///
    /// Any failure before commit deletes every asset this call uploaded and
    /// the reserved record before returning.
    pub async fn create(
        &self,
        kind: EntityKind,
        request: WriteRequest,
        cancel: &CancellationToken,
    ) -> SagaResult<Entity> {
        let descriptor = self.descriptor(kind)?;
        ensure_live(cancel)?;

        let now = Utc::now();
        let mut placeholder = FieldMap::new();
        AuditStamp::created(request.actor.as_deref(), now).write_into(&mut placeholder);
        let id = self
            .records
            .create(kind.collection(), placeholder)
            .await
            .map_err(store_down)?;
        debug!(entity_id = %id, kind = %kind, "record reserved");

        let mut intent = WriteIntent::for_create(kind, id.clone());
        let (fields, actor) = match self
            .prepare_create(descriptor, &mut intent, request, cancel)
            .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(entity_id = %id, kind = %kind, error = %e, "create aborted");
                intent.compensate(self.blobs.as_ref(), self.records.as_ref()).await;
                return Err(e);
            }
        };

        let entity = Entity::new(id.clone(), fields, AuditStamp::created(Some(&actor), now));
        self.records
            .update(kind.collection(), &id, entity.to_document())
            .await
            .map_err(store_down)?;
        info!(entity_id = %id, kind = %kind, actor = %actor, "entity created");
        Ok(entity)
    }

    async fn prepare_create(
        &self,
        descriptor: &EntityDescriptor,
        intent: &mut WriteIntent,
        request: WriteRequest,
        cancel: &CancellationToken,
    ) -> SagaResult<(FieldMap, String)> {
        let id = intent.target().clone();
        let mut fields = client_fields(descriptor, request.body.clone());

        for slot in &descriptor.asset_fields {
            let files = files_for_slot(slot, &request);
            if files.is_empty() {
                continue;
            }
            ensure_live(cancel)?;
            match self.upload_field(slot, &id, &files).await {
                Ok(locators) => {
                    fields.insert(slot.name.into(), asset_value(slot, &locators).to_value());
                    intent.record_upload(slot.name, locators);
                }
                Err((uploaded, e)) => {
                    intent.record_upload(slot.name, uploaded);
                    return Err(e);
                }
            }
        }

        ensure_live(cancel)?;
        let errors = descriptor.schema.validate(&fields);
        if !errors.is_empty() {
            return Err(SagaError::ValidationFailed(errors));
        }

        let actor = request.actor.ok_or(SagaError::Unauthorized)?;
        ensure_live(cancel)?;
        Ok((fields, actor))
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    /// Load, resolve asset fields, merge, validate, authorize, commit, then
    /// clean up replaced and removed assets in the background.
    ///
    /// A failure before commit deletes only what this call uploaded; the
    /// stored record and its committed assets are never touched.
    pub async fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        request: WriteRequest,
        cancel: &CancellationToken,
    ) -> SagaResult<UpdateOutcome> {
        let descriptor = self.descriptor(kind)?;
        ensure_live(cancel)?;

        let existing = self.get(kind, id).await?;
        let mut intent = WriteIntent::for_update(kind, existing);

        let (fields, audit, actor) = match self
            .prepare_update(descriptor, &mut intent, request, cancel)
            .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(entity_id = %id, kind = %kind, error = %e, "update aborted");
                intent.compensate(self.blobs.as_ref(), self.records.as_ref()).await;
                return Err(e);
            }
        };

        let entity = Entity::new(id.clone(), fields, audit);
        self.records
            .update(kind.collection(), id, entity.to_document())
            .await
            .map_err(store_down)?;
        info!(entity_id = %id, kind = %kind, actor = %actor, "entity updated");

        let cleanup = self.schedule_cleanup(id, intent.into_doomed());
        Ok(UpdateOutcome { entity, cleanup })
    }

    async fn prepare_update(
        &self,
        descriptor: &EntityDescriptor,
        intent: &mut WriteIntent,
        request: WriteRequest,
        cancel: &CancellationToken,
    ) -> SagaResult<(FieldMap, AuditStamp, String)> {
        let existing = snapshot_of(intent)?;
        let id = existing.id.clone();

        let mut removals = HashMap::new();
        for slot in &descriptor.asset_fields {
            if let Some(key) = slot.removal_key {
                let requested = parse_removals(key, request.body.get(key))?;
                removals.insert(slot.name, requested);
            }
        }

        let outcomes = join_all(descriptor.asset_fields.iter().map(|slot| {
            let files = files_for_slot(slot, &request);
            let removed = removals.get(slot.name).cloned().unwrap_or_default();
            self.resolve_field(slot, &id, existing, files, removed, cancel)
        }))
        .await;

        let mut candidate = existing.fields.clone();
        candidate.extend(client_fields(descriptor, request.body.clone()));

        let mut first_error = None;
        for outcome in outcomes {
            intent.record_upload(outcome.field, outcome.uploaded);
            intent.doom(outcome.doomed);
            if let Some(e) = outcome.error {
                if first_error.is_none() {
                    first_error = Some(e);
                }
                continue;
            }
            if let Some(value) = outcome.value {
                candidate.insert(outcome.field.into(), value.to_value());
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        ensure_live(cancel)?;
        let errors = descriptor.schema.validate(&candidate);
        if !errors.is_empty() {
            return Err(SagaError::ValidationFailed(errors));
        }

        let actor = request.actor.ok_or(SagaError::Unauthorized)?;
        ensure_live(cancel)?;
        let audit = snapshot_of(intent)?.audit.touched(&actor, Utc::now());
        Ok((candidate, audit, actor))
    }

    /// Work out one asset field's new value for an update.
    async fn resolve_field(
        &self,
        slot: &AssetFieldSpec,
        id: &EntityId,
        existing: &Entity,
        files: Vec<&AdmittedFile>,
        removed: Vec<Locator>,
        cancel: &CancellationToken,
    ) -> FieldOutcome {
        let current = existing.asset(slot.name, slot.multi);
        let current_locators = current.locators();

        let removed: Vec<Locator> = removed
            .into_iter()
            .filter(|l| {
                let owned = current_locators.contains(l);
                if !owned {
                    debug!(field = slot.name, locator = %l, "ignoring removal of locator not held by this record");
                }
                owned
            })
            .collect();

        let mut outcome = FieldOutcome {
            field: slot.name,
            value: None,
            uploaded: Vec::new(),
            doomed: Vec::new(),
            error: None,
        };

        let uploaded = if files.is_empty() {
            Vec::new()
        } else if let Err(e) = ensure_live(cancel) {
            outcome.error = Some(e);
            return outcome;
        } else {
            match self.upload_field(slot, id, &files).await {
                Ok(locators) => locators,
                Err((partial, e)) => {
                    outcome.uploaded = partial;
                    outcome.error = Some(e);
                    return outcome;
                }
            }
        };

        if removed.is_empty() && uploaded.is_empty() {
            return outcome;
        }

        if slot.multi {
            let dropped: HashSet<&Locator> = removed.iter().collect();
            let mut next: Vec<Locator> = current_locators
                .iter()
                .filter(|l| !dropped.contains(l))
                .cloned()
                .collect();
            next.extend(uploaded.iter().cloned());
            outcome.value = Some(AssetValue::Multi(next));
            outcome.doomed = removed;
        } else if let Some(new) = uploaded.first() {
            outcome.value = Some(AssetValue::Single(Some(new.clone())));
            outcome.doomed = current_locators;
        }
        outcome.uploaded = uploaded;
        outcome
    }

    fn schedule_cleanup(&self, id: &EntityId, doomed: Vec<Locator>) -> CleanupHandle {
        if doomed.is_empty() {
            return CleanupHandle::none();
        }
        let blobs = Arc::clone(&self.blobs);
        let id = id.clone();
        let task = tokio::spawn(async move {
            let report = blobs.delete_many(&doomed).await;
            if report.is_clean() {
                debug!(entity_id = %id, deleted = report.deleted, "post-commit cleanup done");
            } else {
                warn!(
                    entity_id = %id,
                    deleted = report.deleted,
                    failed = report.failed.len(),
                    "post-commit cleanup left orphaned assets"
                );
            }
            report
        });
        CleanupHandle { task: Some(task) }
    }

    // -----------------------------------------------------------------------
    // Uploads
    // -----------------------------------------------------------------------

    /// Upload one field's files concurrently. On failure, returns whatever
    /// did land alongside the error so the caller can compensate it.
    async fn upload_field(
        &self,
        slot: &AssetFieldSpec,
        id: &EntityId,
        files: &[&AdmittedFile],
    ) -> Result<Vec<Locator>, (Vec<Locator>, SagaError)> {
        let folder = self.addresser.catalog().folder_for(slot.name).to_owned();
        let items: Vec<PutItem> = files
            .iter()
            .map(|file| PutItem {
                bytes: file.bytes.clone(),
                path: self.addresser.address(slot.name, Some(id), &file.file_name),
                meta: AssetMeta {
                    entity_id: id.to_string(),
                    field: slot.name.to_owned(),
                    folder: folder.clone(),
                    original_name: file.file_name.clone(),
                    content_type: file.content_type.clone(),
                    uploaded_at: Utc::now(),
                },
            })
            .collect();

        match self.blobs.put_many(items).await {
            Ok(locators) => {
                debug!(entity_id = %id, field = slot.name, count = locators.len(), "field uploaded");
                Ok(locators)
            }
            Err(e) => {
                error!(entity_id = %id, field = slot.name, error = %e, "upload failed");
                let uploaded = e.uploaded().to_vec();
                let reason = match &e {
                    estate_store::StoreError::PartialUpload { source, .. } => source.to_string(),
                    other => other.to_string(),
                };
                Err((
                    uploaded,
                    SagaError::UploadFailed {
                        field: slot.name.to_owned(),
                        reason,
                    },
                ))
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.descriptors.keys().collect();
        kinds.sort();
        f.debug_struct("Orchestrator")
            .field("kinds", &kinds)
            .field("bucket", &self.blobs.codec().bucket())
            .finish()
    }
}

fn ensure_live(cancel: &CancellationToken) -> SagaResult<()> {
    if cancel.is_cancelled() {
        Err(SagaError::Cancelled)
    } else {
        Ok(())
    }
}

fn store_down(e: estate_records::RecordError) -> SagaError {
    error!(error = %e, "metadata store call failed");
    SagaError::from(e)
}

/// The client body minus everything the orchestrator owns.
fn client_fields(descriptor: &EntityDescriptor, mut body: FieldMap) -> FieldMap {
    strip_system_keys(&mut body);
    for key in descriptor.reserved_keys() {
        body.remove(key);
    }
    body
}

/// Files for one field; a single-valued field takes only the first.
fn snapshot_of(intent: &WriteIntent) -> SagaResult<&Entity> {
    intent
        .snapshot()
        .ok_or_else(|| SagaError::InvalidRequest("update has no loaded record".into()))
}

fn files_for_slot<'a>(slot: &AssetFieldSpec, request: &'a WriteRequest) -> Vec<&'a AdmittedFile> {
    let files: Vec<&AdmittedFile> = request.files_for(slot.name).collect();
    if !slot.multi && files.len() > 1 {
        debug!(field = slot.name, extra = files.len() - 1, "ignoring extra files for single-valued field");
        return files.into_iter().take(1).collect();
    }
    files
}

fn asset_value(slot: &AssetFieldSpec, locators: &[Locator]) -> AssetValue {
    if slot.multi {
        AssetValue::Multi(locators.to_vec())
    } else {
        AssetValue::Single(locators.first().cloned())
    }
}

/// Parse a removal directive. Accepts a JSON array of strings or a string
/// holding one (multipart forms can only carry text).
fn parse_removals(key: &str, value: Option<&Value>) -> SagaResult<Vec<Locator>> {
    let invalid = || SagaError::InvalidRequest(format!("{key} must be a list of URLs"));
    let parsed;
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(Vec::new()),
        Some(Value::String(s)) => {
            parsed = serde_json::from_str::<Value>(s).map_err(|_| invalid())?;
            match &parsed {
                Value::Array(items) => items,
                _ => return Err(invalid()),
            }
        }
        Some(_) => return Err(invalid()),
    };
    items
        .iter()
        .map(|v| v.as_str().map(Locator::from).ok_or_else(invalid))
        .collect()
}
