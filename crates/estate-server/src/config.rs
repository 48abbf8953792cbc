use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

use estate_store::BlobStoreConfig;
use estate_types::FieldCatalog;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
    pub blob: BlobStoreConfig,
    pub identity: IdentityConfig,
    pub catalog: FieldCatalog,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_body_bytes: 600 * 1024 * 1024,
            blob: BlobStoreConfig::default(),
            identity: IdentityConfig::default(),
            catalog: FieldCatalog::default(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}

/// Where the acting identity comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// Header set by a trusted upstream (gateway, session layer) carrying
    /// the verified email of the caller.
    pub header: String,
    /// Static bearer tokens, token to email.
    pub tokens: BTreeMap<String, String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            header: "x-authenticated-email".into(),
            tokens: BTreeMap::new(),
        }
    }
}
