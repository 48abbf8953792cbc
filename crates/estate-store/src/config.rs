use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::fs::FilesystemBlobStore;
use crate::locator::LocatorCodec;
use crate::memory::InMemoryBlobStore;
use crate::traits::BlobStore;

/// Which blob store implementation to open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    #[default]
    Memory,
    Filesystem,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlobStoreConfig {
    pub backend: BlobBackend,
    /// Root directory for the filesystem backend.
    pub root: PathBuf,
    /// Prefix of every public locator, without the bucket.
    pub public_base_url: String,
    pub bucket: String,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        let codec = LocatorCodec::default();
        Self {
            backend: BlobBackend::Memory,
            root: PathBuf::from("./blobs"),
            public_base_url: codec.public_base_url().to_owned(),
            bucket: codec.bucket().to_owned(),
        }
    }
}

impl BlobStoreConfig {
    pub fn codec(&self) -> LocatorCodec {
        LocatorCodec::new(self.public_base_url.clone(), self.bucket.clone())
    }

    /// Open the configured backend, creating the filesystem root if needed.
    pub async fn open(&self) -> StoreResult<Arc<dyn BlobStore>> {
        match self.backend {
            BlobBackend::Memory => Ok(Arc::new(InMemoryBlobStore::with_codec(self.codec()))),
            BlobBackend::Filesystem => {
                tokio::fs::create_dir_all(&self.root).await?;
                tracing::info!(root = %self.root.display(), bucket = %self.bucket, "filesystem blob store opened");
                Ok(Arc::new(FilesystemBlobStore::new(self.root.clone(), self.codec())))
            }
        }
    }
}
