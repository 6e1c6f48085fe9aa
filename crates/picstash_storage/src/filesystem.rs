//! Filesystem-based blob storage implementation.
//!
//! Each blob is one file named after its key, fanned out into two-character
//! subdirectories so no single directory grows without bound.

use crate::{BlobStore, BlobStream, StorageResult};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use picstash_core::BlobKey;
use picstash_error::{StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

/// Size of the chunks yielded by [`FileSystemBlobStore::get_stream`].
const CHUNK_SIZE: usize = 64 * 1024;

/// Filesystem storage backend.
///
/// Stores blobs in the structure `{base_path}/{key[0:2]}/{key}`:
///
/// ```text
/// /var/picstash/blobs/
/// ├── 3f/
/// │   └── 3f2a9c1e-8d4b-4e7a-9b1f-0c6d5e4a3b21
/// └── a7/
///     └── a71c0e52-...
/// ```
///
/// Writes go to a uniquely named temp file in the target directory and are
/// renamed into place, so readers never observe a partially written blob and
/// an overwrite replaces the old content atomically.
#[derive(Debug, Clone)]
pub struct FileSystemBlobStore {
    base_path: PathBuf,
}

impl FileSystemBlobStore {
    /// Create a new filesystem storage backend.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or accessed.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::info!(path = %base_path.display(), "Created filesystem blob store");
        Ok(Self { base_path })
    }

    /// Root directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Filesystem path for a key.
    fn get_path(&self, key: &BlobKey) -> PathBuf {
        let key = key.as_str();
        let prefix = key.get(0..2).unwrap_or(key);
        self.base_path.join(prefix).join(key)
    }

    fn temp_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
    }
}

fn not_found_or(
    e: std::io::Error,
    key: &BlobKey,
    other: impl FnOnce(String) -> StorageErrorKind,
    path: &Path,
) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::new(StorageErrorKind::NotFound(key.to_string()))
    } else {
        StorageError::new(other(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    #[tracing::instrument(skip(self, key, data), fields(key = %key, size = data.len()))]
    async fn put(&self, key: &BlobKey, data: Bytes, content_type: &str) -> StorageResult<()> {
        let path = self.get_path(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let temp_path = Self::temp_path(&path);
        tokio::fs::write(&temp_path, &data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))));
        }

        tracing::info!(
            key = %key,
            path = %path.display(),
            size = data.len(),
            content_type,
            "Stored blob"
        );
        Ok(())
    }

    #[tracing::instrument(skip(self, key), fields(key = %key))]
    async fn get_stream(&self, key: &BlobKey) -> StorageResult<BlobStream> {
        let path = self.get_path(key);
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| not_found_or(e, key, StorageErrorKind::FileRead, &path))?;

        tracing::debug!(key = %key, path = %path.display(), "Opened blob for streaming");

        let stream = futures_util::stream::try_unfold((file, path), |(mut file, path)| async move {
            let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
            let read = file.read_buf(&mut buf).await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })?;
            if read == 0 {
                return Ok::<_, StorageError>(None);
            }
            Ok(Some((buf.freeze(), (file, path))))
        });

        Ok(Box::pin(stream))
    }

    #[tracing::instrument(skip(self, key), fields(key = %key))]
    async fn delete(&self, key: &BlobKey) -> StorageResult<()> {
        let path = self.get_path(key);

        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or(e, key, StorageErrorKind::FileDelete, &path))?;

        tracing::info!(key = %key, path = %path.display(), "Deleted blob");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_keys(&self) -> StorageResult<Vec<BlobKey>> {
        let read_err = |path: &Path, e: std::io::Error| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
        };

        let mut keys = Vec::new();
        let mut shards = tokio::fs::read_dir(&self.base_path)
            .await
            .map_err(|e| read_err(&self.base_path, e))?;

        while let Some(shard) = shards
            .next_entry()
            .await
            .map_err(|e| read_err(&self.base_path, e))?
        {
            let shard_path = shard.path();
            if !shard_path.is_dir() {
                continue;
            }
            let mut entries = tokio::fs::read_dir(&shard_path)
                .await
                .map_err(|e| read_err(&shard_path, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| read_err(&shard_path, e))?
            {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                // Skip in-flight temp files and anything that is not a key.
                if let Ok(key) = BlobKey::parse(&name) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        tracing::debug!(count = keys.len(), "Listed blob keys");
        Ok(keys)
    }

    #[tracing::instrument(skip(self, key), fields(key = %key))]
    async fn exists(&self, key: &BlobKey) -> StorageResult<bool> {
        let path = self.get_path(key);
        tokio::fs::try_exists(&path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })
    }

    /// Modification time of the blob file. The rename in [`BlobStore::put`]
    /// carries the temp file's mtime, so this is the time of the last write.
    #[tracing::instrument(skip(self, key), fields(key = %key))]
    async fn stored_at(&self, key: &BlobKey) -> StorageResult<DateTime<Utc>> {
        let path = self.get_path(key);
        let modified = tokio::fs::metadata(&path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| not_found_or(e, key, StorageErrorKind::FileRead, &path))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
