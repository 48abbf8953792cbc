//! Metadata record store for the estate backend.
//!
//! Entity documents are kept in named collections (`developers`,
//! `projects`, ...) keyed by a store-assigned [`EntityId`](estate_types::EntityId).
//! The orchestrator consumes the store only through [`MetadataStore`]; this
//! crate also ships [`InMemoryMetadataStore`] for tests and local runs.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{RecordError, RecordResult};
pub use memory::InMemoryMetadataStore;
pub use traits::MetadataStore;
