//! Core data types for the picstash image store.
//!
//! This crate provides the types shared by every picstash component: record and
//! tag entities, identifiers, the content hasher, and the typed listing query.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod hash;
mod ids;
mod image;
mod query;
mod tag;

pub use hash::ContentHash;
pub use ids::{BlobKey, ImageId, TagId};
pub use image::{BlobBinding, ImageRecord, ImageUpdate, MetadataPatch, NewImageRecord};
pub use query::{
    DEFAULT_PAGE_SIZE, ListQuery, ListQueryBuilder, ListQueryBuilderError, SearchResult, SortKey,
    SortOrder, TagFilter, TagMatch,
};
pub use tag::{Tag, TagValue};
