//! Asset addressing and blob storage for the estate backend.
//!
//! Binary assets (images, videos, documents) live in a blob store separate
//! from the metadata records that reference them. This crate owns the two
//! leaf components of the write path:
//!
//! - [`AssetAddresser`] -- derives a collision-free, human-traceable path for
//!   an upload from its field, owning entity and original filename.
//! - [`BlobStore`] -- uploads bytes to a path and hands back a public
//!   [`Locator`](estate_types::Locator); deletes by locator.
//!
//! # Storage Backends
//!
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//! - [`FilesystemBlobStore`] -- directory tree on local disk
//!
//! # Design Rules
//!
//! 1. Addressing is pure and total; it never consults the store.
//! 2. `put_many` never cleans up after itself. A partial failure reports the
//!    locators that did land so the caller can compensate.
//! 3. Deleting something that is already gone is not an error.
//! 4. `delete_many` is best-effort: failures are logged and counted, never
//!    raised.

pub mod address;
pub mod config;
pub mod error;
pub mod fs;
pub mod locator;
pub mod memory;
pub mod traits;

pub use address::{sanitize_basename, split_filename, AssetAddresser, AssetPath};
pub use config::{BlobBackend, BlobStoreConfig};
pub use error::{StoreError, StoreResult};
pub use fs::FilesystemBlobStore;
pub use locator::LocatorCodec;
pub use memory::InMemoryBlobStore;
pub use traits::{AssetMeta, BlobStore, DeleteReport, PutItem};
