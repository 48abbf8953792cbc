//! Validation and admission gates for the estate backend.
//!
//! Two independent checks guard the write path:
//!
//! - [`EntitySchema`] validates a fully merged candidate document and
//!   returns every field error in rule order. It is pure: no I/O, no clock.
//! - [`AdmissionGate`] screens uploaded files (field, type, size, count)
//!   before the orchestrator ever sees them.
//!
//! # Quick Start
//!
//! ```rust
//! use estate_gate::schema_for;
//! use estate_types::EntityKind;
//! use serde_json::json;
//!
//! let doc = json!({ "name": "Tower A", "projectId": "p1" });
//! let errors = schema_for(EntityKind::Tower).validate(doc.as_object().unwrap());
//! assert!(errors.is_empty());
//! ```

pub mod admission;
pub mod error;
pub mod schema;

pub use admission::{AdmissionGate, IncomingFile};
pub use error::GateError;
pub use schema::{schema_for, EntitySchema, FieldError, FieldRule};
