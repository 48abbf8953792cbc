use std::fmt;

use chrono::Utc;
use estate_types::{EntityId, FieldCatalog};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A path inside the blob store, relative to the bucket root.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetPath(String);

impl AssetPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, ignoring empty ones.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// `true` if the path has no segment that could escape its root.
    pub fn is_contained(&self) -> bool {
        !self.0.is_empty()
            && !self.0.starts_with('/')
            && self.segments().all(|s| s != ".." && s != ".")
    }
}

impl fmt::Debug for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetPath({})", self.0)
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replace everything outside `[a-zA-Z0-9.-]` with `_`, collapse runs of `_`
/// and lower-case the result.
pub fn sanitize_basename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Split an uploaded filename into `(stem, extension)`.
///
/// Only the final path component is considered (both `/` and `\` separate).
/// The extension runs from the last `.` and includes it; a name whose only
/// dot is its first character has no extension.
pub fn split_filename(name: &str) -> (&str, &str) {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(0) | None => (base, ""),
        Some(i) => base.split_at(i),
    }
}

/// Derives blob-store paths for uploads.
///
/// Path shape: `<folder>/[<entityId>/]<sanitized-stem>_<millis>_<uuid><ext>`.
/// The random UUID makes two uploads of the same file, for the same field and
/// entity, in the same millisecond land at different paths.
#[derive(Clone, Debug)]
pub struct AssetAddresser {
    catalog: FieldCatalog,
}

impl AssetAddresser {
    pub fn new(catalog: FieldCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    /// Address an upload now.
    pub fn address(
        &self,
        field: &str,
        entity_id: Option<&EntityId>,
        original_filename: &str,
    ) -> AssetPath {
        self.address_at(
            field,
            entity_id,
            original_filename,
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
        )
    }

    /// Deterministic core of [`Self::address`].
    pub fn address_at(
        &self,
        field: &str,
        entity_id: Option<&EntityId>,
        original_filename: &str,
        unix_millis: i64,
        nonce: Uuid,
    ) -> AssetPath {
        let folder = self.catalog.folder_for(field);
        let (stem, ext) = split_filename(original_filename);
        let name = format!(
            "{}_{}_{}{}",
            sanitize_basename(stem),
            unix_millis,
            nonce.hyphenated(),
            ext.to_lowercase()
        );
        match entity_id.filter(|id| !id.is_empty()) {
            Some(id) => AssetPath(format!("{folder}/{id}/{name}")),
            None => AssetPath(format!("{folder}/{name}")),
        }
    }
}

impl Default for AssetAddresser {
    fn default() -> Self {
        Self::new(FieldCatalog::default())
    }
}
