//! Content-deduplicating image library for picstash.
//!
//! [`ImageLibrary`] is the engine that ties metadata records to blobs:
//!
//! - uploads hash their bytes and reuse an existing blob when the content is
//!   already stored
//! - file replacement rebinds to an existing blob or overwrites in place, and
//!   deletes the old blob once nothing references it
//! - record deletion removes the blob together with its last referent
//! - [`ImageLibrary::reconcile`] finds what an interrupted sequence left behind
//!
//! The engine never assumes a transaction spanning both stores. It orders its
//! calls so that a failure part-way leaves one of two adjacent well-defined
//! states; the only exception is a record pointing at a deleted blob after an
//! interrupted delete, which the reconciliation sweep reports.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod library;
mod reconcile;

pub use config::{LibraryConfig, LibraryConfigBuilder, LibraryConfigBuilderError};
pub use library::ImageLibrary;
pub use reconcile::{ReconcileMode, ReconciliationReport};
