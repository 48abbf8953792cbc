//! HTTP surface for the estate backend.
//!
//! Decodes JSON or multipart bodies, admits uploaded files, resolves the
//! acting identity and hands each write to the saga orchestrator on its
//! own task.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod multipart;
pub mod router;
pub mod server;

pub use auth::{ConfiguredIdentity, IdentityProvider};
pub use config::{IdentityConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use multipart::{decode_body, DecodedBody};
pub use server::EstateServer;
