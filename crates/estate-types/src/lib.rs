//! Foundation types for the estate backend.
//!
//! Every other estate crate depends on `estate-types`. It carries no I/O.
//!
//! # Key Types
//!
//! - [`EntityId`] -- system-assigned identifier of a metadata record
//! - [`Locator`] -- opaque, publicly resolvable reference to a stored asset
//! - [`EntityKind`] -- developer, project, tower or series
//! - [`Entity`] -- field map plus [`AuditStamp`]
//! - [`AssetValue`] -- the locator(s) held by an asset field
//! - [`FieldCatalog`] -- explicit per-field folder/category/limit table

pub mod catalog;
pub mod entity;
pub mod error;
pub mod id;
pub mod kind;

pub use catalog::{FieldCatalog, FieldPolicy};
pub use entity::{strip_system_keys, AssetValue, AuditStamp, Entity, FieldMap, SYSTEM_KEYS};
pub use error::TypeError;
pub use id::{EntityId, Locator};
pub use kind::{AssetCategory, EntityKind};
