use estate_records::MetadataStore;
use estate_store::BlobStore;
use estate_types::{Entity, EntityId, EntityKind, Locator};
use tracing::warn;

/// Request-local bookkeeping for one write.
///
/// Tracks what this request has put into the stores so a failure can be
/// undone, and what it has scheduled for removal once the write commits.
/// Owned by a single orchestrator call and dropped when it returns.
#[derive(Debug)]
pub struct WriteIntent {
    kind: EntityKind,
    target: EntityId,
    /// Set when `target` is a placeholder this request created.
    reserved: bool,
    uploaded: Vec<(String, Vec<Locator>)>,
    doomed: Vec<Locator>,
    snapshot: Option<Entity>,
}

impl WriteIntent {
    pub fn for_create(kind: EntityKind, reserved_id: EntityId) -> Self {
        Self {
            kind,
            target: reserved_id,
            reserved: true,
            uploaded: Vec::new(),
            doomed: Vec::new(),
            snapshot: None,
        }
    }

    pub fn for_update(kind: EntityKind, existing: Entity) -> Self {
        Self {
            kind,
            target: existing.id.clone(),
            reserved: false,
            uploaded: Vec::new(),
            doomed: Vec::new(),
            snapshot: Some(existing),
        }
    }

    pub fn target(&self) -> &EntityId {
        &self.target
    }

    pub fn snapshot(&self) -> Option<&Entity> {
        self.snapshot.as_ref()
    }

    pub fn record_upload(&mut self, field: &str, locators: Vec<Locator>) {
        if locators.is_empty() {
            return;
        }
        match self.uploaded.iter_mut().find(|(f, _)| f == field) {
            Some((_, existing)) => existing.extend(locators),
            None => self.uploaded.push((field.to_owned(), locators)),
        }
    }

    /// Locators this request uploaded for `field`.
    pub fn uploaded_for(&self, field: &str) -> &[Locator] {
        self.uploaded
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, l)| l.as_slice())
            .unwrap_or(&[])
    }

    /// Every locator this request uploaded, in field order.
    pub fn uploaded(&self) -> Vec<Locator> {
        self.uploaded.iter().flat_map(|(_, l)| l.iter().cloned()).collect()
    }

    /// Schedule locators for deletion after commit.
    pub fn doom(&mut self, locators: impl IntoIterator<Item = Locator>) {
        self.doomed.extend(locators);
    }

    pub fn doomed(&self) -> &[Locator] {
        &self.doomed
    }

    pub fn into_doomed(self) -> Vec<Locator> {
        self.doomed
    }

    /// Undo this request's side effects: delete its uploads and, on create,
    /// the placeholder record.
    ///
    /// Best-effort. Failures are logged and leave orphans behind; they are
    /// never raised, so the caller's original error is what surfaces.
    pub async fn compensate(&self, blobs: &dyn BlobStore, records: &dyn MetadataStore) {
        let uploaded = self.uploaded();
        if !uploaded.is_empty() {
            let report = blobs.delete_many(&uploaded).await;
            if !report.is_clean() {
                warn!(
                    entity_id = %self.target,
                    orphaned = report.failed.len(),
                    "compensation left orphaned assets"
                );
            }
        }

        if self.reserved {
            if let Err(e) = records.delete(self.kind.collection(), &self.target).await {
                warn!(
                    entity_id = %self.target,
                    kind = %self.kind,
                    error = %e,
                    "failed to delete reserved record"
                );
            }
        }

        warn!(
            entity_id = %self.target,
            kind = %self.kind,
            assets = uploaded.len(),
            reserved = self.reserved,
            "write compensated"
        );
    }
}
