use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use estate_types::Locator;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::address::AssetPath;
use crate::error::{StoreError, StoreResult};
use crate::locator::LocatorCodec;
use crate::traits::{AssetMeta, BlobStore};

const META_SUFFIX: &str = ".meta.json";

/// Blob store on local disk.
///
/// Each asset is written to `<root>/<path>` with a JSON sidecar at
/// `<root>/<path>.meta.json` holding its [`AssetMeta`]. Writes go through a
/// temporary file and a rename so a reader never sees a torn object.
pub struct FilesystemBlobStore {
    root: PathBuf,
    codec: LocatorCodec,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>, codec: LocatorCodec) -> Self {
        Self {
            root: root.into(),
            codec,
        }
    }

    fn full_path(&self, path: &AssetPath) -> StoreResult<PathBuf> {
        if !path.is_contained() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(path.segments().fold(self.root.clone(), |acc, seg| acc.join(seg)))
    }

    fn meta_path(full: &Path) -> PathBuf {
        let mut name = full.as_os_str().to_owned();
        name.push(META_SUFFIX);
        PathBuf::from(name)
    }

    /// Read an object's bytes back.
    pub async fn read(&self, path: &AssetPath) -> StoreResult<Vec<u8>> {
        Ok(fs::read(self.full_path(path)?).await?)
    }

    /// Read an object's sidecar tags.
    pub async fn read_meta(&self, path: &AssetPath) -> StoreResult<AssetMeta> {
        let raw = fs::read(Self::meta_path(&self.full_path(path)?)).await?;
        serde_json::from_slice(&raw).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Write through `<target>.tmp` and rename into place. The temp file is
    /// removed if any step fails.
    async fn write_atomic(target: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut temp_name = target.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp = PathBuf::from(temp_name);
        let result = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp, target).await
        }
        .await;
        if result.is_err() {
            discard(&temp).await;
        }
        result
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, bytes: Bytes, path: &AssetPath, meta: &AssetMeta) -> StoreResult<Locator> {
        let full = self.full_path(path)?;
        debug!(path = %path, size = bytes.len(), "blob put");

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "create_dir_all failed");
                write_failed(path, &e)
            })?;
        }

        let sidecar =
            serde_json::to_vec_pretty(meta).map_err(|e| StoreError::Serialization(e.to_string()))?;
        // Sidecar first: an object is only ever visible once its tags are.
        let meta_path = Self::meta_path(&full);
        Self::write_atomic(&meta_path, &sidecar)
            .await
            .map_err(|e| write_failed(path, &e))?;
        if let Err(e) = Self::write_atomic(&full, &bytes).await {
            discard(&meta_path).await;
            return Err(write_failed(path, &e));
        }

        Ok(self.locator_for(path))
    }

    async fn exists(&self, path: &AssetPath) -> StoreResult<bool> {
        let full = self.full_path(path)?;
        Ok(fs::try_exists(full).await?)
    }

    async fn remove(&self, path: &AssetPath) -> StoreResult<bool> {
        let full = self.full_path(path)?;
        let existed = match fs::remove_file(&full).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        match fs::remove_file(Self::meta_path(&full)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path, error = %e, "sidecar removal failed"),
        }
        Ok(existed)
    }

    fn codec(&self) -> &LocatorCodec {
        &self.codec
    }
}

async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to discard partial write"),
    }
}

fn write_failed(path: &AssetPath, e: &std::io::Error) -> StoreError {
    StoreError::WriteFailed {
        path: path.to_string(),
        reason: e.to_string(),
    }
}

impl std::fmt::Debug for FilesystemBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemBlobStore")
            .field("root", &self.root)
            .field("bucket", &self.codec.bucket())
            .finish()
    }
}
