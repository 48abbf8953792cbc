use std::fmt;

use serde::{Deserialize, Serialize};

/// System-assigned identifier of a metadata record.
///
/// Identifiers are opaque to every layer above the metadata store. Ids minted
/// by this crate are UUID v7 in simple (hyphen-free) form, so they sort by
/// creation time and are safe to use as a blob-store path segment.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Mint a fresh, time-ordered identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().simple().to_string())
    }

    /// Wrap an identifier issued elsewhere (path parameter, store key).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque, durable reference to a stored asset.
///
/// A locator is usable both for public retrieval and for later deletion. It
/// carries no structure at this layer; only the blob store knows how to map
/// it back to a storage path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty or whitespace-only locators never point at a blob.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self.0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_path_safe() {
        let a = EntityId::generate();
        let b = EntityId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_sort_by_creation() {
        let a = EntityId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = EntityId::generate();
        assert!(a < b);
    }

    #[test]
    fn blank_locators() {
        assert!(Locator::new("").is_blank());
        assert!(Locator::new("   ").is_blank());
        assert!(!Locator::new("https://x/y").is_blank());
    }

    #[test]
    fn serde_is_transparent() {
        let loc = Locator::new("https://storage.googleapis.com/b/a.png");
        let json = serde_json::to_string(&loc).unwrap();
        assert_eq!(json, "\"https://storage.googleapis.com/b/a.png\"");
        let id: EntityId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", EntityId::new("x1")), "EntityId(x1)");
        assert_eq!(format!("{}", Locator::new("l")), "l");
    }
}
