use estate_types::{EntityKind, FieldMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One problem with a candidate document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Individual rule within a schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldRule {
    /// Field must be present, non-null and not a blank string.
    Required(String),
    /// When present, the field must be one of these strings.
    OneOf { field: String, values: Vec<String> },
    /// When present, an array field may hold at most `max` items.
    MaxItems { field: String, max: usize },
    /// When present, the field must be a number (or numeric string) >= 0.
    NonNegativeNumber(String),
    /// Single asset field: null or a string.
    Locator(String),
    /// Multi asset field: an array of strings.
    LocatorList(String),
}

impl FieldRule {
    pub fn field(&self) -> &str {
        match self {
            Self::Required(f)
            | Self::NonNegativeNumber(f)
            | Self::Locator(f)
            | Self::LocatorList(f) => f,
            Self::OneOf { field, .. } | Self::MaxItems { field, .. } => field,
        }
    }

    fn check(&self, doc: &FieldMap) -> Option<FieldError> {
        let field = self.field();
        let value = doc.get(field).filter(|v| !v.is_null());
        match (self, value) {
            (Self::Required(_), None) => Some(FieldError::new(field, format!("{field} is required"))),
            (Self::Required(_), Some(Value::String(s))) if s.trim().is_empty() => {
                Some(FieldError::new(field, format!("{field} is required")))
            }
            (Self::Required(_), Some(_)) => None,

            (_, None) => None,

            (Self::OneOf { values, .. }, Some(v)) => match v.as_str() {
                Some(s) if values.iter().any(|allowed| allowed == s) => None,
                _ => Some(FieldError::new(
                    field,
                    format!("{field} must be one of: {}", values.join(", ")),
                )),
            },

            (Self::MaxItems { max, .. }, Some(Value::Array(items))) if items.len() > *max => Some(
                FieldError::new(field, format!("{field} may hold at most {max} items")),
            ),
            (Self::MaxItems { .. }, Some(_)) => None,

            (Self::NonNegativeNumber(_), Some(v)) => {
                let n = match v {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                match n {
                    Some(n) if n >= 0.0 => None,
                    _ => Some(FieldError::new(
                        field,
                        format!("{field} must be a non-negative number"),
                    )),
                }
            }

            (Self::Locator(_), Some(Value::String(_))) => None,
            (Self::Locator(_), Some(_)) => {
                Some(FieldError::new(field, format!("{field} must be a URL string")))
            }

            (Self::LocatorList(_), Some(Value::Array(items))) if items.iter().all(Value::is_string) => {
                None
            }
            (Self::LocatorList(_), Some(_)) => Some(FieldError::new(
                field,
                format!("{field} must be a list of URL strings"),
            )),
        }
    }
}

/// Ordered validation rules for one entity kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub rules: Vec<FieldRule>,
}

impl EntitySchema {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// Check a candidate document. Errors come back in rule order; an empty
    /// result means the candidate may be committed.
    pub fn validate(&self, doc: &FieldMap) -> Vec<FieldError> {
        self.rules.iter().filter_map(|rule| rule.check(doc)).collect()
    }
}

fn status_rule() -> FieldRule {
    FieldRule::OneOf {
        field: "status".into(),
        values: vec!["Active".into(), "Disable".into()],
    }
}

/// Built-in schema for each entity kind.
pub fn schema_for(kind: EntityKind) -> EntitySchema {
    use FieldRule::*;

    let mut rules = vec![Required("name".into())];
    match kind {
        EntityKind::Developer => {
            rules.push(Locator("logoUrl".into()));
        }
        EntityKind::Project => {
            rules.extend([
                Required("developerId".into()),
                LocatorList("images".into()),
                MaxItems { field: "images".into(), max: 50 },
                LocatorList("videos".into()),
                MaxItems { field: "videos".into(), max: 10 },
                Locator("brochureUrl".into()),
                Locator("reraCertificateUrl".into()),
            ]);
        }
        EntityKind::Tower => {
            rules.extend([
                Required("projectId".into()),
                NonNegativeNumber("totalFloors".into()),
            ]);
        }
        EntityKind::Series => {
            rules.extend([
                Required("towerId".into()),
                LocatorList("insideImagesUrls".into()),
                MaxItems { field: "insideImagesUrls".into(), max: 50 },
                LocatorList("insideVideosUrls".into()),
                MaxItems { field: "insideVideosUrls".into(), max: 10 },
                Locator("layoutPlanUrl".into()),
            ]);
        }
    }
    rules.push(status_rule());
    EntitySchema::new(rules)
}
