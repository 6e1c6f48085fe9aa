//! picstash - content-deduplicating image metadata and blob store
//!
//! Uploaded images are fingerprinted with SHA-256; identical bytes are stored
//! once while any number of metadata records point at them. A blob is removed
//! only when the last record referencing it goes away.
//!
//! # Quick Start
//!
//! ```rust
//! use picstash::{
//!     Bytes, ImageLibrary, InMemoryBlobStore, InMemoryMetadataStore, MetadataPatch, TagValue,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let library = ImageLibrary::new(
//!     Arc::new(InMemoryMetadataStore::new()),
//!     Arc::new(InMemoryBlobStore::new()),
//! );
//!
//! let record = library
//!     .upload(Bytes::from_static(b"GIF89a"), "chicken.gif", 6, "image/gif")
//!     .await?;
//! let record = library
//!     .update_metadata(
//!         record.id,
//!         MetadataPatch {
//!             tags: Some(vec![TagValue::new("poultry", "#ffd700")]),
//!             ..MetadataPatch::default()
//!         },
//!     )
//!     .await?;
//! assert_eq!(record.tags.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Cargo Features
//!
//! - `postgres` - PostgreSQL metadata store
//!
//! # Architecture
//!
//! - `picstash_error` - Error types
//! - `picstash_core` - Records, tags, identifiers, hashing, listing queries
//! - `picstash_storage` - Blob store trait and backends
//! - `picstash_database` - Metadata store trait, backends and listing engine
//! - `picstash_library` - Dedup and reference-counting engine
//!
//! This crate re-exports everything and adds configuration and logging setup.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod logging;

pub use config::{
    DatabaseBackend, DatabaseConfig, LoggingConfig, PicstashConfig, StorageBackend, StorageConfig,
};
pub use logging::init_tracing;

pub use bytes::Bytes;
pub use picstash_core::*;
pub use picstash_database::{InMemoryMetadataStore, MetadataStore, listing};
#[cfg(feature = "postgres")]
pub use picstash_database::{PgPool, PostgresMetadataStore, establish_pool, run_migrations};
pub use picstash_error::*;
pub use picstash_library::*;
pub use picstash_storage::{
    BlobStore, BlobStream, FileSystemBlobStore, InMemoryBlobStore, collect_bytes,
};
