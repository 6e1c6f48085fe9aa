//! In-memory blob storage implementation.
//!
//! Useful for unit tests and for embedding picstash without a filesystem.
//! All data is lost when the store is dropped.

use crate::{BlobStore, BlobStream, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use picstash_core::BlobKey;
use picstash_error::{StorageError, StorageErrorKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: String,
    stored_at: DateTime<Utc>,
}

/// In-memory blob store.
///
/// Cloning yields another handle onto the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<BTreeMap<BlobKey, StoredBlob>>>,
}

impl InMemoryBlobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Whether the store holds no blobs.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Content type recorded for `key`, if stored.
    pub async fn content_type(&self, key: &BlobKey) -> Option<String> {
        self.blobs
            .read()
            .await
            .get(key)
            .map(|b| b.content_type.clone())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &BlobKey, data: Bytes, content_type: &str) -> StorageResult<()> {
        let size = data.len();
        self.blobs.write().await.insert(
            key.clone(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
                stored_at: Utc::now(),
            },
        );
        tracing::debug!(key = %key, size, "Stored blob in memory");
        Ok(())
    }

    async fn get_stream(&self, key: &BlobKey) -> StorageResult<BlobStream> {
        let data = self
            .blobs
            .read()
            .await
            .get(key)
            .map(|b| b.data.clone())
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(key.to_string())))?;
        Ok(Box::pin(futures_util::stream::iter([Ok::<_, StorageError>(data)])))
    }

    async fn delete(&self, key: &BlobKey) -> StorageResult<()> {
        self.blobs
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(key.to_string())))?;
        tracing::debug!(key = %key, "Deleted blob from memory");
        Ok(())
    }

    async fn list_keys(&self) -> StorageResult<Vec<BlobKey>> {
        Ok(self.blobs.read().await.keys().cloned().collect())
    }

    async fn exists(&self, key: &BlobKey) -> StorageResult<bool> {
        Ok(self.blobs.read().await.contains_key(key))
    }

    async fn stored_at(&self, key: &BlobKey) -> StorageResult<DateTime<Utc>> {
        self.blobs
            .read()
            .await
            .get(key)
            .map(|b| b.stored_at)
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(key.to_string())))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
