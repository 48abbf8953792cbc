use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::TypeError;
use crate::id::{EntityId, Locator};

/// Field name to value mapping, as held by the metadata store.
pub type FieldMap = serde_json::Map<String, Value>;

pub const KEY_ID: &str = "id";
pub const KEY_CREATED_BY: &str = "createdBy";
pub const KEY_CREATED_ON: &str = "createdOn";
pub const KEY_UPDATED_BY: &str = "updatedBy";
pub const KEY_UPDATED_ON: &str = "updatedOn";

/// Keys owned by the write path. Client-supplied values for these are
/// discarded before a document is merged.
pub const SYSTEM_KEYS: [&str; 5] = [
    KEY_ID,
    KEY_CREATED_BY,
    KEY_CREATED_ON,
    KEY_UPDATED_BY,
    KEY_UPDATED_ON,
];

// ---------------------------------------------------------------------------
// AuditStamp
// ---------------------------------------------------------------------------

/// Who created and last updated a record, and when.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditStamp {
    /// `None` only on a reservation placeholder written without an identity.
    pub created_by: Option<String>,
    pub created_on: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_on: Option<DateTime<Utc>>,
}

impl AuditStamp {
    /// Stamp for a record created now by `actor`.
    pub fn created(actor: Option<&str>, at: DateTime<Utc>) -> Self {
        Self {
            created_by: actor.map(str::to_owned),
            created_on: at,
            updated_by: None,
            updated_on: None,
        }
    }

    /// Keep the creation half, record `actor` as the latest updater.
    pub fn touched(&self, actor: &str, at: DateTime<Utc>) -> Self {
        Self {
            created_by: self.created_by.clone(),
            created_on: self.created_on,
            updated_by: Some(actor.to_owned()),
            updated_on: Some(at),
        }
    }

    /// Write the audit keys into a document.
    pub fn write_into(&self, doc: &mut FieldMap) {
        doc.insert(KEY_CREATED_BY.into(), opt_string(self.created_by.as_deref()));
        doc.insert(KEY_CREATED_ON.into(), Value::String(timestamp(&self.created_on)));
        doc.insert(KEY_UPDATED_BY.into(), opt_string(self.updated_by.as_deref()));
        doc.insert(
            KEY_UPDATED_ON.into(),
            self.updated_on
                .as_ref()
                .map(|t| Value::String(timestamp(t)))
                .unwrap_or(Value::Null),
        );
    }

    /// Read the audit keys out of a stored document.
    ///
    /// A document without `createdOn` is treated as created at the Unix epoch
    /// rather than rejected; such records predate audit stamping.
    pub fn read_from(doc: &FieldMap) -> Result<Self, TypeError> {
        Ok(Self {
            created_by: read_string(doc, KEY_CREATED_BY),
            created_on: read_time(doc, KEY_CREATED_ON)?.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            updated_by: read_string(doc, KEY_UPDATED_BY),
            updated_on: read_time(doc, KEY_UPDATED_ON)?,
        })
    }
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn opt_string(s: Option<&str>) -> Value {
    s.map(|s| Value::String(s.to_owned())).unwrap_or(Value::Null)
}

fn read_string(doc: &FieldMap, key: &str) -> Option<String> {
    doc.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn read_time(doc: &FieldMap, key: &str) -> Result<Option<DateTime<Utc>>, TypeError> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| TypeError::InvalidTimestamp {
                field: key.to_owned(),
                value: s.clone(),
            }),
        Some(other) => Err(TypeError::InvalidTimestamp {
            field: key.to_owned(),
            value: other.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A committed (or reserved) metadata record.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    /// Domain fields, never containing any of [`SYSTEM_KEYS`].
    pub fields: FieldMap,
    pub audit: AuditStamp,
}

impl Entity {
    pub fn new(id: EntityId, mut fields: FieldMap, audit: AuditStamp) -> Self {
        strip_system_keys(&mut fields);
        Self { id, fields, audit }
    }

    /// The document persisted in the metadata store (no `id` key).
    pub fn to_document(&self) -> FieldMap {
        let mut doc = self.fields.clone();
        self.audit.write_into(&mut doc);
        doc
    }

    /// Rebuild an entity from a stored document.
    pub fn from_document(id: EntityId, doc: FieldMap) -> Result<Self, TypeError> {
        let audit = AuditStamp::read_from(&doc)?;
        Ok(Self::new(id, doc, audit))
    }

    /// The client-facing representation: `{ id, ...fields, audit }`.
    pub fn to_json(&self) -> Value {
        let mut doc = FieldMap::new();
        doc.insert(KEY_ID.into(), Value::String(self.id.to_string()));
        doc.extend(self.to_document());
        Value::Object(doc)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Read an asset field in its declared shape.
    pub fn asset(&self, name: &str, multi: bool) -> AssetValue {
        AssetValue::read(&self.fields, name, multi)
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Remove every orchestrator-owned key from a client-supplied map.
pub fn strip_system_keys(fields: &mut FieldMap) {
    for key in SYSTEM_KEYS {
        fields.remove(key);
    }
}

// ---------------------------------------------------------------------------
// AssetValue
// ---------------------------------------------------------------------------

/// The locator content of one asset field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetValue {
    Single(Option<Locator>),
    Multi(Vec<Locator>),
}

impl AssetValue {
    /// Read a field leniently: a multi field stored as a bare string becomes a
    /// one-element list, a single field stored as a list keeps its first
    /// entry, blank strings and non-string entries are dropped.
    pub fn read(fields: &FieldMap, field: &str, multi: bool) -> Self {
        let raw: Vec<Locator> = match fields.get(field) {
            Some(Value::String(s)) => vec![Locator::new(s.clone())],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(Locator::from)
                .collect(),
            _ => Vec::new(),
        };
        let mut raw: Vec<Locator> = raw.into_iter().filter(|l| !l.is_blank()).collect();
        if multi {
            Self::Multi(raw)
        } else if raw.is_empty() {
            Self::Single(None)
        } else {
            Self::Single(Some(raw.swap_remove(0)))
        }
    }

    /// Every non-blank locator held, in order.
    pub fn locators(&self) -> Vec<Locator> {
        match self {
            Self::Single(Some(l)) if !l.is_blank() => vec![l.clone()],
            Self::Single(_) => Vec::new(),
            Self::Multi(ls) => ls.iter().filter(|l| !l.is_blank()).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locators().is_empty()
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Single(Some(l)) => Value::String(l.to_string()),
            Self::Single(None) => Value::Null,
            Self::Multi(ls) => Value::Array(
                ls.iter().map(|l| Value::String(l.to_string())).collect(),
            ),
        }
    }
}
