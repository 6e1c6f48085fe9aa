//! Error types for the picstash image store.
//!
//! This crate provides the foundation error types used throughout the picstash workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! [`PicstashError`] aggregates every domain error, and [`PicstashError::class`]
//! maps it onto the coarse taxonomy a service shell reports to its callers.
//!
//! # Examples
//!
//! ```
//! use picstash_error::{ErrorClass, LibraryError, LibraryErrorKind, PicstashResult};
//!
//! fn delete_locked() -> PicstashResult<()> {
//!     Err(LibraryError::new(LibraryErrorKind::Locked("42".to_string())))?
//! }
//!
//! let err = delete_locked().unwrap_err();
//! assert_eq!(err.class(), ErrorClass::Locked);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod library;
mod storage;

pub use config::ConfigError;
pub use database::{DatabaseError, DatabaseErrorKind};
pub use error::{ErrorClass, PicstashError, PicstashErrorKind, PicstashResult};
pub use library::{LibraryError, LibraryErrorKind};
pub use storage::{StorageError, StorageErrorKind};
