use std::collections::BTreeMap;

use estate_types::{AssetCategory, FieldCatalog};
use serde::{Deserialize, Serialize};

use crate::error::GateError;

const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp", "bmp", "tiff", "svg"];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "wmv", "flv", "webm", "m4v", "mpeg", "mpg",
];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "jpg", "jpeg", "png", "gif", "webp", "csv", "xls", "xlsx", "txt",
];

/// A file as received from the client, before admission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingFile {
    pub field: String,
    pub file_name: String,
    /// Declared MIME type; may be empty.
    pub content_type: String,
    pub size: u64,
}

/// Per-field type, size and count checks.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    catalog: FieldCatalog,
}

impl AdmissionGate {
    pub fn new(catalog: FieldCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    /// Admit a whole request's files or reject on the first offending one.
    pub fn admit(&self, files: &[IncomingFile]) -> Result<(), GateError> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for file in files {
            self.admit_one(file)?;
            *counts.entry(file.field.as_str()).or_default() += 1;
        }
        for (field, count) in counts {
            if let Some(policy) = self.catalog.get(field) {
                if count > policy.max_count {
                    tracing::debug!(field, count, max = policy.max_count, "too many files");
                    return Err(GateError::admission(
                        field,
                        format!("at most {} file(s) allowed, got {count}", policy.max_count),
                    ));
                }
            }
        }
        Ok(())
    }

    fn admit_one(&self, file: &IncomingFile) -> Result<(), GateError> {
        let field = file.field.as_str();
        let policy = self
            .catalog
            .get(field)
            .ok_or_else(|| GateError::admission(field, "unexpected file field"))?;

        let ext = extension(&file.file_name);
        if !allowed_extensions(policy.category).contains(&ext.as_str()) {
            return Err(GateError::admission(
                field,
                format!("'{}' is not an accepted {} file", file.file_name, policy.category),
            ));
        }

        if !mime_matches(policy.category, &file.content_type) {
            return Err(GateError::admission(
                field,
                format!(
                    "content type '{}' does not match {} category",
                    file.content_type, policy.category
                ),
            ));
        }

        if file.size > policy.max_bytes {
            return Err(GateError::admission(
                field,
                format!(
                    "'{}' is {} bytes, limit is {}",
                    file.file_name, file.size, policy.max_bytes
                ),
            ));
        }
        Ok(())
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(FieldCatalog::default())
    }
}

fn allowed_extensions(category: AssetCategory) -> &'static [&'static str] {
    match category {
        AssetCategory::Image => IMAGE_EXTENSIONS,
        AssetCategory::Video => VIDEO_EXTENSIONS,
        AssetCategory::Document => DOCUMENT_EXTENSIONS,
    }
}

fn extension(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.rfind('.') {
        Some(i) if i > 0 => base[i + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

// An absent or generic declaration never contradicts the extension.
fn mime_matches(category: AssetCategory, content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if mime.is_empty() || mime == "application/octet-stream" {
        return true;
    }
    match category {
        AssetCategory::Image => mime.starts_with("image/"),
        AssetCategory::Video => mime.starts_with("video/"),
        AssetCategory::Document => {
            mime.starts_with("application/") || mime.starts_with("text/") || mime.starts_with("image/")
        }
    }
}
