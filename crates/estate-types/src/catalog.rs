use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kind::AssetCategory;

const MIB: u64 = 1024 * 1024;

/// Storage and admission policy for one asset field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldPolicy {
    /// Top-level folder in the blob store.
    pub folder: String,
    /// Media category files for this field must belong to.
    pub category: AssetCategory,
    /// Largest accepted file, in bytes.
    pub max_bytes: u64,
    /// Most files accepted for this field in one request.
    pub max_count: usize,
}

impl FieldPolicy {
    pub fn new(folder: &str, category: AssetCategory, max_bytes: u64, max_count: usize) -> Self {
        Self {
            folder: folder.to_owned(),
            category,
            max_bytes,
            max_count,
        }
    }
}

/// Explicit per-field configuration shared by asset addressing and the
/// admission gate.
///
/// Passed by value into the components that need it; nothing reads a
/// process-wide table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldCatalog {
    fields: BTreeMap<String, FieldPolicy>,
}

impl FieldCatalog {
    /// An empty catalog: every field is unrecognized.
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Add or replace the policy for `field`.
    pub fn with(mut self, field: &str, policy: FieldPolicy) -> Self {
        self.fields.insert(field.to_owned(), policy);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldPolicy> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Folder for `field`, falling back to the field name itself.
    pub fn folder_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.fields
            .get(field)
            .map(|p| p.folder.as_str())
            .unwrap_or(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldPolicy)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        use AssetCategory::*;
        Self::empty()
            .with("logoUrl", FieldPolicy::new("DeveloperLogo", Image, 10 * MIB, 1))
            .with("images", FieldPolicy::new("ProjectImages", Image, 50 * MIB, 50))
            .with("videos", FieldPolicy::new("ProjectVideos", Video, 500 * MIB, 10))
            .with("brochureUrl", FieldPolicy::new("ProjectBrochures", Document, 50 * MIB, 1))
            .with(
                "reraCertificateUrl",
                FieldPolicy::new("ReraCertificatePdf", Document, 50 * MIB, 1),
            )
            .with("layoutPlanUrl", FieldPolicy::new("SeriesLayouts", Image, 50 * MIB, 1))
            .with("insideImagesUrls", FieldPolicy::new("SeriesImages", Image, 50 * MIB, 50))
            .with("insideVideosUrls", FieldPolicy::new("SeriesVideos", Video, 500 * MIB, 10))
            .with("amenityLogo", FieldPolicy::new("AmenitiesLogo", Image, 10 * MIB, 1))
    }
}
