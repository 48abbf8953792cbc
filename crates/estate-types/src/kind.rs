use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The kinds of entity the backend manages.
///
/// All kinds share the entity document shape; they differ in which fields
/// hold assets and in their validation schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Developer,
    Project,
    Tower,
    Series,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [Self::Developer, Self::Project, Self::Tower, Self::Series];

    /// Metadata-store collection holding records of this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Developer => "developers",
            Self::Project => "projects",
            Self::Tower => "towers",
            Self::Series => "series",
        }
    }

    /// Human-readable name used in client-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Developer => "Developer",
            Self::Project => "Project",
            Self::Tower => "Tower",
            Self::Series => "Series",
        }
    }

    /// Resolve a route segment (`developers`, `projects`, `towers`, `series`).
    pub fn from_collection(segment: &str) -> Result<Self, TypeError> {
        Self::ALL
            .into_iter()
            .find(|k| k.collection() == segment)
            .ok_or_else(|| TypeError::UnknownKind(segment.to_owned()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for EntityKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "developer" => Ok(Self::Developer),
            "project" => Ok(Self::Project),
            "tower" => Ok(Self::Tower),
            "series" => Ok(Self::Series),
            other => Self::from_collection(other),
        }
    }
}

/// Media category an asset field accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Image,
    Video,
    Document,
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Video => f.write_str("video"),
            Self::Document => f.write_str("document"),
        }
    }
}
