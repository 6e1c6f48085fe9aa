//! Blob storage for picstash.
//!
//! A blob store maps opaque [`BlobKey`]s to bytes. It knows nothing about
//! records, hashes or reference counts; the dedup engine decides when a key is
//! written and when it may be removed.
//!
//! # Backends
//!
//! - [`FileSystemBlobStore`]: one file per key under a base directory
//! - [`InMemoryBlobStore`]: process-local map, for tests and embedded use
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use picstash_core::BlobKey;
//! use picstash_storage::{BlobStore, InMemoryBlobStore, collect_bytes};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryBlobStore::new();
//! let key = BlobKey::generate();
//! store.put(&key, Bytes::from_static(b"GIF89a"), "image/gif").await?;
//!
//! let data = collect_bytes(store.get_stream(&key).await?).await?;
//! assert_eq!(&data[..], b"GIF89a");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filesystem;
mod memory;

pub use filesystem::FileSystemBlobStore;
pub use memory::InMemoryBlobStore;
pub use picstash_error::{StorageError, StorageErrorKind};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures_util::stream::{Stream, TryStreamExt};
use picstash_core::BlobKey;
use std::pin::Pin;

/// Result type for blob store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Stream of blob content chunks.
pub type BlobStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Trait for pluggable blob storage backends.
///
/// Every method is a suspension point; implementations must tolerate
/// concurrent calls on unrelated keys.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing content.
    ///
    /// # Arguments
    ///
    /// * `key` - Destination key
    /// * `data` - The blob bytes
    /// * `content_type` - MIME type, kept by backends that support it
    async fn put(&self, key: &BlobKey, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Stream the content stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing is stored under the key.
    async fn get_stream(&self, key: &BlobKey) -> StorageResult<BlobStream>;

    /// Remove the content stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing is stored under the key.
    async fn delete(&self, key: &BlobKey) -> StorageResult<()>;

    /// Enumerate every stored key.
    async fn list_keys(&self) -> StorageResult<Vec<BlobKey>>;

    /// Check whether content is stored under `key`.
    async fn exists(&self, key: &BlobKey) -> StorageResult<bool>;

    /// When the content under `key` was last written.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing is stored under the key.
    async fn stored_at(&self, key: &BlobKey) -> StorageResult<DateTime<Utc>>;

    /// Backend name for logs (e.g. "filesystem", "memory").
    fn backend_name(&self) -> &'static str;
}

/// Drain a blob stream into a single buffer.
pub async fn collect_bytes(stream: BlobStream) -> StorageResult<Bytes> {
    let buf = stream
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await?;
    Ok(buf.freeze())
}
