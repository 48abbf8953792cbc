use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::config::IdentityConfig;

/// Supplies the acting identity for a request, if there is one.
///
/// Absence is not an error here; the orchestrator decides when an identity
/// is required.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify(&self, headers: &HeaderMap) -> Option<String>;
}

/// Identity from a trusted upstream header, falling back to a static
/// bearer-token table.
#[derive(Clone, Debug)]
pub struct ConfiguredIdentity {
    header: String,
    tokens: BTreeMap<String, String>,
}

impl ConfiguredIdentity {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            header: config.header.to_ascii_lowercase(),
            tokens: config.tokens,
        }
    }
}

#[async_trait]
impl IdentityProvider for ConfiguredIdentity {
    async fn identify(&self, headers: &HeaderMap) -> Option<String> {
        let trusted = headers
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(email) = trusted {
            return Some(email.to_owned());
        }

        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)?;
        let email = self.tokens.get(token).cloned();
        if email.is_none() {
            tracing::debug!("unrecognized bearer token");
        }
        email
    }
}
