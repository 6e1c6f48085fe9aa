//! Image metadata persistence for picstash.
//!
//! This crate defines the [`MetadataStore`] repository interface consumed by the
//! dedup engine, the listing engine that gives every backend the same
//! filter/collapse/sort/paginate semantics, and the backends themselves.
//!
//! # Backends
//!
//! - [`InMemoryMetadataStore`]: `RwLock`-guarded maps, for tests and embedded use
//! - `PostgresMetadataStore` (feature `postgres`): Diesel over PostgreSQL
//!
//! # Example
//!
//! ```rust
//! use picstash_core::{BlobKey, ContentHash, NewImageRecord};
//! use picstash_database::{InMemoryMetadataStore, MetadataStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryMetadataStore::new();
//! let record = store
//!     .create(NewImageRecord {
//!         title: "chicken.png".to_string(),
//!         description: String::new(),
//!         lock_file: false,
//!         file_size: 4,
//!         file_type: "image/png".to_string(),
//!         blob_key: BlobKey::generate(),
//!         content_hash: ContentHash::compute(b"\x89PNG"),
//!         tags: vec![],
//!     })
//!     .await?;
//!
//! assert_eq!(store.count_by_blob_key(&record.blob_key).await?, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod listing;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryMetadataStore;
pub use picstash_error::{DatabaseError, DatabaseErrorKind};
#[cfg(feature = "postgres")]
pub use postgres::{PgPool, PostgresMetadataStore, establish_pool, run_migrations};

use async_trait::async_trait;
use picstash_core::{
    BlobKey, ContentHash, ImageId, ImageRecord, ImageUpdate, ListQuery, NewImageRecord,
    SearchResult, Tag, TagValue,
};
use std::collections::BTreeSet;

/// Result type for metadata store operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Repository interface for image records and tags.
///
/// Implementations must make each method atomic on its own; the dedup engine
/// composes them without any cross-call transaction.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist a new record, assigning its id, version and timestamps.
    async fn create(&self, record: NewImageRecord) -> DatabaseResult<ImageRecord>;

    /// Load a record by id.
    async fn get_by_id(&self, id: ImageId) -> DatabaseResult<Option<ImageRecord>>;

    /// Load the earliest-created record carrying `hash`.
    async fn get_by_hash(&self, hash: &ContentHash) -> DatabaseResult<Option<ImageRecord>>;

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record does not exist
    /// - `VersionConflict` if `update.expected_version` is set and stale; the
    ///   record is left untouched
    async fn update(&self, id: ImageId, update: ImageUpdate) -> DatabaseResult<ImageRecord>;

    /// Remove a record. Returns `true` if it existed.
    async fn delete(&self, id: ImageId) -> DatabaseResult<bool>;

    /// Number of records currently bound to `key`.
    async fn count_by_blob_key(&self, key: &BlobKey) -> DatabaseResult<u64>;

    /// Run a listing query.
    async fn list(&self, query: &ListQuery) -> DatabaseResult<SearchResult>;

    /// Resolve a tag by value, creating it on first use.
    ///
    /// Calling this twice with the same value returns the same tag, and
    /// concurrent calls never create two tags with one value.
    async fn get_or_create_tag(&self, value: &TagValue) -> DatabaseResult<Tag>;

    /// Every blob key referenced by at least one record.
    async fn referenced_blob_keys(&self) -> DatabaseResult<BTreeSet<BlobKey>>;

    /// Backend name for logs (e.g. "memory", "postgres").
    fn backend_name(&self) -> &'static str;
}
