//! In-memory implementation of [`MetadataStore`] for testing.
//!
//! Stores records in a HashMap protected by an RwLock. Insertion order is kept
//! separately so hash lookups and duplicate collapsing are deterministic.
//! All data is lost when the store is dropped.

use crate::{DatabaseResult, MetadataStore, listing};
use async_trait::async_trait;
use chrono::Utc;
use picstash_core::{
    BlobKey, ContentHash, ImageId, ImageRecord, ImageUpdate, ListQuery, NewImageRecord,
    SearchResult, Tag, TagId, TagValue,
};
use picstash_error::{DatabaseError, DatabaseErrorKind};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    images: HashMap<ImageId, ImageRecord>,
    /// Record ids in insertion order
    order: Vec<ImageId>,
    tags: Vec<Tag>,
}

impl State {
    fn ordered(&self) -> impl Iterator<Item = &ImageRecord> {
        self.order.iter().filter_map(|id| self.images.get(id))
    }
}

/// In-memory metadata store.
///
/// Cloning yields another handle onto the same state.
///
/// # Example
/// ```no_run
/// use picstash_database::{InMemoryMetadataStore, MetadataStore};
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryMetadataStore::new();
///     assert!(store.is_empty().await);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryMetadataStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (for testing).
    pub async fn len(&self) -> usize {
        self.state.read().await.images.len()
    }

    /// Check if the store holds no records (for testing).
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.images.is_empty()
    }

    /// Number of distinct tags (for testing).
    pub async fn tag_count(&self) -> usize {
        self.state.read().await.tags.len()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create(&self, record: NewImageRecord) -> DatabaseResult<ImageRecord> {
        let now = Utc::now();
        let created = ImageRecord {
            id: ImageId::new(),
            title: record.title,
            description: record.description,
            lock_file: record.lock_file,
            created_at: now,
            updated_at: now,
            file_updated_at: now,
            file_size: record.file_size,
            file_type: record.file_type,
            blob_key: record.blob_key,
            content_hash: record.content_hash,
            tags: record.tags,
            version: 1,
        };

        let mut state = self.state.write().await;
        state.order.push(created.id);
        state.images.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: ImageId) -> DatabaseResult<Option<ImageRecord>> {
        Ok(self.state.read().await.images.get(&id).cloned())
    }

    async fn get_by_hash(&self, hash: &ContentHash) -> DatabaseResult<Option<ImageRecord>> {
        let state = self.state.read().await;
        Ok(state.ordered().find(|r| &r.content_hash == hash).cloned())
    }

    async fn update(&self, id: ImageId, update: ImageUpdate) -> DatabaseResult<ImageRecord> {
        let mut state = self.state.write().await;
        let record = state
            .images
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::new(DatabaseErrorKind::NotFound(id.to_string())))?;

        if let Some(expected) = update.expected_version
            && expected != record.version
        {
            return Err(DatabaseError::new(DatabaseErrorKind::VersionConflict {
                id: id.to_string(),
                expected,
                actual: record.version,
            }));
        }

        let now = Utc::now();
        if let Some(title) = update.title {
            record.title = title;
        }
        if let Some(description) = update.description {
            record.description = description;
        }
        if let Some(lock_file) = update.lock_file {
            record.lock_file = lock_file;
        }
        if let Some(tags) = update.tags {
            record.tags = tags;
        }
        if let Some(binding) = update.binding {
            record.blob_key = binding.blob_key;
            record.content_hash = binding.content_hash;
            record.file_size = binding.file_size;
            record.file_type = binding.file_type;
            record.file_updated_at = now;
        }
        record.updated_at = now;
        record.version += 1;

        Ok(record.clone())
    }

    async fn delete(&self, id: ImageId) -> DatabaseResult<bool> {
        let mut state = self.state.write().await;
        let existed = state.images.remove(&id).is_some();
        if existed {
            state.order.retain(|other| other != &id);
        }
        Ok(existed)
    }

    async fn count_by_blob_key(&self, key: &BlobKey) -> DatabaseResult<u64> {
        let state = self.state.read().await;
        Ok(state.images.values().filter(|r| &r.blob_key == key).count() as u64)
    }

    async fn list(&self, query: &ListQuery) -> DatabaseResult<SearchResult> {
        let records: Vec<ImageRecord> = {
            let state = self.state.read().await;
            state.ordered().cloned().collect()
        };
        Ok(listing::run(records, query))
    }

    async fn get_or_create_tag(&self, value: &TagValue) -> DatabaseResult<Tag> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.tags.iter().find(|t| t.matches(value)) {
            return Ok(existing.clone());
        }

        let tag = Tag {
            id: TagId::new(),
            label: value.label.clone(),
            color: value.color.clone(),
        };
        state.tags.push(tag.clone());
        tracing::debug!(tag_id = %tag.id, label = %tag.label, color = %tag.color, "Created tag");
        Ok(tag)
    }

    async fn referenced_blob_keys(&self) -> DatabaseResult<BTreeSet<BlobKey>> {
        let state = self.state.read().await;
        Ok(state.images.values().map(|r| r.blob_key.clone()).collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
