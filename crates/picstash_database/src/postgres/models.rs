//! Diesel rows for the image tables and their conversions to domain types.

use super::schema::{image_tags, images, tags};
use crate::DatabaseResult;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use picstash_core::{BlobKey, ContentHash, ImageRecord, ImageUpdate, NewImageRecord, Tag};
use picstash_error::{DatabaseError, DatabaseErrorKind};
use uuid::Uuid;

/// Database row for the `images` table.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = images)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ImageRow {
    pub id: Uuid,
    pub seq: i64,
    pub title: String,
    pub description: String,
    pub lock_file: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub file_updated_at: DateTime<Utc>,
    pub file_size: i64,
    pub file_type: String,
    pub blob_key: String,
    pub content_hash: String,
    pub version: i64,
}

impl ImageRow {
    /// Convert to a domain record carrying `tags`.
    pub fn into_record(self, tags: Vec<Tag>) -> DatabaseResult<ImageRecord> {
        let blob_key = BlobKey::parse(&self.blob_key).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Serialization(format!(
                "Stored blob key for {} is invalid: {}",
                self.id, e
            )))
        })?;
        let content_hash = ContentHash::parse(&self.content_hash).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Serialization(format!(
                "Stored content hash for {} is invalid: {}",
                self.id, e
            )))
        })?;

        Ok(ImageRecord {
            id: self.id.into(),
            title: self.title,
            description: self.description,
            lock_file: self.lock_file,
            created_at: self.created_at,
            updated_at: self.updated_at,
            file_updated_at: self.file_updated_at,
            file_size: from_db_int(self.file_size, "file_size")?,
            file_type: self.file_type,
            blob_key,
            content_hash,
            tags,
            version: from_db_int(self.version, "version")?,
        })
    }
}

/// Insertable row for a new image.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = images)]
pub struct NewImageRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub lock_file: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub file_updated_at: DateTime<Utc>,
    pub file_size: i64,
    pub file_type: String,
    pub blob_key: String,
    pub content_hash: String,
    pub version: i64,
}

impl NewImageRow {
    /// Build the row for `record`, stamping every timestamp with `now`.
    pub fn from_new(id: Uuid, record: &NewImageRecord, now: DateTime<Utc>) -> DatabaseResult<Self> {
        Ok(Self {
            id,
            title: record.title.clone(),
            description: record.description.clone(),
            lock_file: record.lock_file,
            created_at: now,
            updated_at: now,
            file_updated_at: now,
            file_size: to_db_int(record.file_size, "file_size")?,
            file_type: record.file_type.clone(),
            blob_key: record.blob_key.as_str().to_string(),
            content_hash: record.content_hash.as_str().to_string(),
            version: 1,
        })
    }
}

/// Partial update for an image row. `None` fields are left alone.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = images)]
pub struct ImageChangeset {
    pub title: Option<String>,
    pub description: Option<String>,
    pub lock_file: Option<bool>,
    pub file_updated_at: Option<DateTime<Utc>>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub blob_key: Option<String>,
    pub content_hash: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl ImageChangeset {
    /// Changeset applying `update` on top of `current_version`.
    pub fn from_update(
        update: &ImageUpdate,
        current_version: i64,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Self> {
        let binding = update.binding.as_ref();
        Ok(Self {
            title: update.title.clone(),
            description: update.description.clone(),
            lock_file: update.lock_file,
            file_updated_at: binding.map(|_| now),
            file_size: binding
                .map(|b| to_db_int(b.file_size, "file_size"))
                .transpose()?,
            file_type: binding.map(|b| b.file_type.clone()),
            blob_key: binding.map(|b| b.blob_key.as_str().to_string()),
            content_hash: binding.map(|b| b.content_hash.as_str().to_string()),
            updated_at: now,
            version: current_version + 1,
        })
    }
}

/// Database row for the `tags` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = tags)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TagRow {
    pub id: Uuid,
    pub label: String,
    pub color: String,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: row.id.into(),
            label: row.label,
            color: row.color,
        }
    }
}

/// Insertable row linking an image to a tag at a list position.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = image_tags)]
pub struct ImageTagRow {
    pub image_id: Uuid,
    pub tag_id: Uuid,
    pub position: i32,
}

impl ImageTagRow {
    /// Rows for `tags` on `image_id`, keeping list order. Repeated tags keep
    /// their first position.
    pub fn for_tags(image_id: Uuid, tags: &[Tag]) -> Vec<Self> {
        let mut seen = std::collections::HashSet::new();
        tags.iter()
            .filter(|t| seen.insert(t.id))
            .enumerate()
            .map(|(position, tag)| Self {
                image_id,
                tag_id: *tag.id.as_uuid(),
                position: i32::try_from(position).unwrap_or(i32::MAX),
            })
            .collect()
    }
}

fn to_db_int(value: u64, field: &str) -> DatabaseResult<i64> {
    i64::try_from(value).map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::Serialization(format!(
            "{} {} does not fit in BIGINT",
            field, value
        )))
    })
}

fn from_db_int(value: i64, field: &str) -> DatabaseResult<u64> {
    u64::try_from(value).map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::Serialization(format!(
            "Stored {} {} is negative",
            field, value
        )))
    })
}
