//! Image record types.

use crate::{BlobKey, ContentHash, ImageId, Tag, TagValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logical image entry: display metadata bound to a stored blob.
///
/// Several records may share a `blob_key`; the blob lives for as long as at
/// least one record references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Record identity
    pub id: ImageId,
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
    /// When set, the blob binding is frozen and the record cannot be deleted
    pub lock_file: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change of any field
    pub updated_at: DateTime<Utc>,
    /// Last change of the blob binding
    pub file_updated_at: DateTime<Utc>,
    /// Size of the bound blob in bytes
    pub file_size: u64,
    /// MIME type of the bound blob
    pub file_type: String,
    /// Blob this record points at
    pub blob_key: BlobKey,
    /// Fingerprint of the bound bytes
    pub content_hash: ContentHash,
    /// Attached tags
    pub tags: Vec<Tag>,
    /// Revision counter, bumped by every update
    pub version: u64,
}

impl ImageRecord {
    /// Whether the record carries a tag with the given id.
    pub fn has_tag(&self, id: &crate::TagId) -> bool {
        self.tags.iter().any(|t| &t.id == id)
    }
}

/// Fields supplied when creating a record.
///
/// The metadata store assigns the id, the version and all timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewImageRecord {
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
    /// Lock flag
    pub lock_file: bool,
    /// Size of the bound blob in bytes
    pub file_size: u64,
    /// MIME type of the bound blob
    pub file_type: String,
    /// Blob to bind
    pub blob_key: BlobKey,
    /// Fingerprint of the bound bytes
    pub content_hash: ContentHash,
    /// Attached tags
    pub tags: Vec<Tag>,
}

/// A new blob binding for an existing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobBinding {
    /// Blob to bind
    pub blob_key: BlobKey,
    /// Fingerprint of the bound bytes
    pub content_hash: ContentHash,
    /// Size of the bound blob in bytes
    pub file_size: u64,
    /// MIME type of the bound blob
    pub file_type: String,
}

/// Partial update applied by the metadata store.
///
/// `None` leaves a field untouched. Setting `binding` also moves
/// `file_updated_at`; every update moves `updated_at` and bumps `version`.
/// When `expected_version` is set the update only applies if the stored
/// version still matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageUpdate {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New lock flag
    pub lock_file: Option<bool>,
    /// Replacement tag set (already resolved)
    pub tags: Option<Vec<Tag>>,
    /// New blob binding
    pub binding: Option<BlobBinding>,
    /// Version the caller read before deciding on this update
    pub expected_version: Option<u64>,
}

impl ImageUpdate {
    /// Rebind the record to another blob, conditional on `expected_version`.
    pub fn rebind(binding: BlobBinding, expected_version: u64) -> Self {
        Self {
            binding: Some(binding),
            expected_version: Some(expected_version),
            ..Self::default()
        }
    }
}

/// Metadata-only edit requested by a caller.
///
/// Never touches the blob binding, so it is allowed on locked records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPatch {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New lock flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_file: Option<bool>,
    /// Replacement tag set, resolved by value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagValue>>,
}
