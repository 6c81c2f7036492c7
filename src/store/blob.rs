//! On-disk payload storage for the flat-file backend.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::{CloudboxError, Result};

/// Blob storage keyed by node id.
///
/// Payloads are spread over 256 shard directories:
/// ```text
/// {base_path}/
/// ├── 01/
/// │   └── 1.bin
/// ├── 2a/
/// │   ├── 42.bin
/// │   └── 298.bin
/// └── ...
/// ```
#[derive(Debug, Clone)]
pub struct BlobStorage {
    base_path: PathBuf,
}

impl BlobStorage {
    /// Create the storage, creating `base_path` if it does not exist.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    /// Base directory of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write the payload of node `id`, replacing any previous payload.
    ///
    /// The bytes land in a temporary sibling first and are renamed into place,
    /// so a reader never observes a half-written blob.
    pub async fn save(&self, id: i64, content: &[u8]) -> Result<()> {
        let path = self.blob_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        write_atomic(&path, content).await
    }

    /// Read the payload of node `id`.
    pub async fn load(&self, id: i64) -> Result<Vec<u8>> {
        match fs::read(self.blob_path(id)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CloudboxError::NotFound(format!("content of node {id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the payload of node `id`. Returns `false` if there was none.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        match fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a payload exists for node `id`.
    pub async fn exists(&self, id: i64) -> bool {
        fs::try_exists(self.blob_path(id)).await.unwrap_or(false)
    }

    /// Full path of the payload for node `id`: `{base}/{shard}/{id}.bin`.
    pub fn blob_path(&self, id: i64) -> PathBuf {
        self.base_path
            .join(Self::shard(id))
            .join(format!("{id}.bin"))
    }

    /// Two lowercase hex digits of `id % 256`.
    fn shard(id: i64) -> String {
        format!("{:02x}", id.rem_euclid(256))
    }

    /// Remove shard directories left empty by deletions.
    pub async fn cleanup_empty_dirs(&self) -> Result<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let mut inner = fs::read_dir(&path).await?;
            if inner.next_entry().await?.is_none() && fs::remove_dir(&path).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Write `content` to `path` through a uniquely named temporary file and a rename.
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("blob");
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    if let Err(e) = fs::write(&tmp, content).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
