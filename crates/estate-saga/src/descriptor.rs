use estate_gate::{schema_for, EntitySchema};
use estate_types::EntityKind;

/// One asset-bearing field of an entity kind.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetFieldSpec {
    pub name: &'static str,
    /// `true` for a list of locators, `false` for a single locator.
    pub multi: bool,
    /// Body key carrying explicit removals for this field, if it takes any.
    pub removal_key: Option<&'static str>,
}

impl AssetFieldSpec {
    pub const fn single(name: &'static str) -> Self {
        Self {
            name,
            multi: false,
            removal_key: None,
        }
    }

    pub const fn multi(name: &'static str, removal_key: &'static str) -> Self {
        Self {
            name,
            multi: true,
            removal_key: Some(removal_key),
        }
    }
}

/// Everything the orchestrator needs to know about an entity kind.
///
/// `asset_fields` is ordered: the create flow uploads fields in exactly this
/// order, so a failure at field *k* compensates fields `0..k`.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub asset_fields: Vec<AssetFieldSpec>,
    pub schema: EntitySchema,
}

impl EntityDescriptor {
    /// Built-in descriptor for `kind`.
    pub fn for_kind(kind: EntityKind) -> Self {
        let asset_fields = match kind {
            EntityKind::Developer => vec![AssetFieldSpec::single("logoUrl")],
            EntityKind::Project => vec![
                AssetFieldSpec::multi("images", "deleteImages"),
                AssetFieldSpec::multi("videos", "deleteVideos"),
                AssetFieldSpec::single("brochureUrl"),
                AssetFieldSpec::single("reraCertificateUrl"),
            ],
            EntityKind::Tower => Vec::new(),
            EntityKind::Series => vec![
                AssetFieldSpec::multi("insideImagesUrls", "deleteInsideImages"),
                AssetFieldSpec::multi("insideVideosUrls", "deleteInsideVideos"),
                AssetFieldSpec::single("layoutPlanUrl"),
            ],
        };
        Self {
            kind,
            asset_fields,
            schema: schema_for(kind),
        }
    }

    pub fn asset_field(&self, name: &str) -> Option<&AssetFieldSpec> {
        self.asset_fields.iter().find(|f| f.name == name)
    }

    /// Body keys the orchestrator owns for this kind: asset fields and their
    /// removal directives. Client values under these keys never reach the
    /// stored document.
    pub fn reserved_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.asset_fields
            .iter()
            .flat_map(|f| std::iter::once(f.name).chain(f.removal_key))
    }
}
