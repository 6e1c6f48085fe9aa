//! Shared fixtures for library tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use picstash_core::{
    BlobKey, ContentHash, ImageId, ImageRecord, ImageUpdate, ListQuery, NewImageRecord,
    SearchResult, Tag, TagValue,
};
use picstash_database::{DatabaseResult, InMemoryMetadataStore, MetadataStore};
use chrono::{DateTime, Utc};
use picstash_library::{ImageLibrary, LibraryConfig, ReconcileMode, ReconciliationReport};
use picstash_storage::{BlobStore, BlobStream, InMemoryBlobStore, StorageResult};
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Blob store that records every `put` and `delete` it forwards.
#[derive(Debug, Clone, Default)]
pub struct RecordingBlobStore {
    pub inner: InMemoryBlobStore,
    puts: Arc<Mutex<Vec<BlobKey>>>,
    deletes: Arc<Mutex<Vec<BlobKey>>>,
}

impl RecordingBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn puts(&self) -> Vec<BlobKey> {
        self.puts.lock().await.clone()
    }

    pub async fn deletes(&self) -> Vec<BlobKey> {
        self.deletes.lock().await.clone()
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn put(&self, key: &BlobKey, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.puts.lock().await.push(key.clone());
        self.inner.put(key, data, content_type).await
    }

    async fn get_stream(&self, key: &BlobKey) -> StorageResult<BlobStream> {
        self.inner.get_stream(key).await
    }

    async fn delete(&self, key: &BlobKey) -> StorageResult<()> {
        self.deletes.lock().await.push(key.clone());
        self.inner.delete(key).await
    }

    async fn list_keys(&self) -> StorageResult<Vec<BlobKey>> {
        self.inner.list_keys().await
    }

    async fn exists(&self, key: &BlobKey) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn stored_at(&self, key: &BlobKey) -> StorageResult<DateTime<Utc>> {
        self.inner.stored_at(key).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Metadata store that lets another writer bump a record right before each
/// of the next `conflicts` conditional updates.
#[derive(Debug, Clone, Default)]
pub struct RacingMetadataStore {
    pub inner: InMemoryMetadataStore,
    conflicts: Arc<AtomicU32>,
    conditional_updates: Arc<AtomicUsize>,
}

impl RacingMetadataStore {
    pub fn new(conflicts: u32) -> Self {
        Self {
            conflicts: Arc::new(AtomicU32::new(conflicts)),
            ..Self::default()
        }
    }

    pub fn conditional_updates(&self) -> usize {
        self.conditional_updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataStore for RacingMetadataStore {
    async fn create(&self, record: NewImageRecord) -> DatabaseResult<ImageRecord> {
        self.inner.create(record).await
    }

    async fn get_by_id(&self, id: ImageId) -> DatabaseResult<Option<ImageRecord>> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_hash(&self, hash: &ContentHash) -> DatabaseResult<Option<ImageRecord>> {
        self.inner.get_by_hash(hash).await
    }

    async fn update(&self, id: ImageId, update: ImageUpdate) -> DatabaseResult<ImageRecord> {
        if update.expected_version.is_some() {
            self.conditional_updates.fetch_add(1, Ordering::SeqCst);
            let raced = self
                .conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if raced {
                self.inner
                    .update(
                        id,
                        ImageUpdate {
                            description: Some("edited concurrently".to_string()),
                            ..ImageUpdate::default()
                        },
                    )
                    .await?;
            }
        }
        self.inner.update(id, update).await
    }

    async fn delete(&self, id: ImageId) -> DatabaseResult<bool> {
        self.inner.delete(id).await
    }

    async fn count_by_blob_key(&self, key: &BlobKey) -> DatabaseResult<u64> {
        self.inner.count_by_blob_key(key).await
    }

    async fn list(&self, query: &ListQuery) -> DatabaseResult<SearchResult> {
        self.inner.list(query).await
    }

    async fn get_or_create_tag(&self, value: &TagValue) -> DatabaseResult<Tag> {
        self.inner.get_or_create_tag(value).await
    }

    async fn referenced_blob_keys(&self) -> DatabaseResult<BTreeSet<BlobKey>> {
        self.inner.referenced_blob_keys().await
    }

    fn backend_name(&self) -> &'static str {
        "racing"
    }
}

/// Metadata store that runs a `RemoveOrphans` sweep inside every `create`,
/// after an upload has written its blob and before its record exists.
#[derive(Debug, Clone, Default)]
pub struct SweepingMetadataStore {
    pub inner: InMemoryMetadataStore,
    library: Arc<OnceLock<ImageLibrary>>,
    reports: Arc<Mutex<Vec<ReconciliationReport>>>,
}

impl SweepingMetadataStore {
    pub async fn reports(&self) -> Vec<ReconciliationReport> {
        self.reports.lock().await.clone()
    }
}

#[async_trait]
impl MetadataStore for SweepingMetadataStore {
    async fn create(&self, record: NewImageRecord) -> DatabaseResult<ImageRecord> {
        if let Some(library) = self.library.get() {
            let report = library
                .reconcile(ReconcileMode::RemoveOrphans)
                .await
                .expect("sweep");
            self.reports.lock().await.push(report);
        }
        self.inner.create(record).await
    }

    async fn get_by_id(&self, id: ImageId) -> DatabaseResult<Option<ImageRecord>> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_hash(&self, hash: &ContentHash) -> DatabaseResult<Option<ImageRecord>> {
        self.inner.get_by_hash(hash).await
    }

    async fn update(&self, id: ImageId, update: ImageUpdate) -> DatabaseResult<ImageRecord> {
        self.inner.update(id, update).await
    }

    async fn delete(&self, id: ImageId) -> DatabaseResult<bool> {
        self.inner.delete(id).await
    }

    async fn count_by_blob_key(&self, key: &BlobKey) -> DatabaseResult<u64> {
        self.inner.count_by_blob_key(key).await
    }

    async fn list(&self, query: &ListQuery) -> DatabaseResult<SearchResult> {
        self.inner.list(query).await
    }

    async fn get_or_create_tag(&self, value: &TagValue) -> DatabaseResult<Tag> {
        self.inner.get_or_create_tag(value).await
    }

    async fn referenced_blob_keys(&self) -> DatabaseResult<BTreeSet<BlobKey>> {
        self.inner.referenced_blob_keys().await
    }

    fn backend_name(&self) -> &'static str {
        "sweeping"
    }
}

/// Library whose metadata store sweeps during every record insert.
pub fn sweeping_library(
    config: LibraryConfig,
) -> (ImageLibrary, SweepingMetadataStore, InMemoryBlobStore) {
    let metadata = SweepingMetadataStore::default();
    let blobs = InMemoryBlobStore::new();
    let library = ImageLibrary::with_config(
        Arc::new(metadata.clone()),
        Arc::new(blobs.clone()),
        config,
    );
    let _ = metadata.library.set(library.clone());
    (library, metadata, blobs)
}

/// Library over in-memory stores, plus handles for inspecting them.
pub struct Harness {
    pub library: ImageLibrary,
    pub metadata: InMemoryMetadataStore,
    pub blobs: RecordingBlobStore,
}

pub fn harness() -> Harness {
    harness_with_config(LibraryConfig::default())
}

pub fn harness_with_config(config: LibraryConfig) -> Harness {
    let metadata = InMemoryMetadataStore::new();
    let blobs = RecordingBlobStore::new();
    let library = ImageLibrary::with_config(
        Arc::new(metadata.clone()),
        Arc::new(blobs.clone()),
        config,
    );
    Harness {
        library,
        metadata,
        blobs,
    }
}

pub async fn upload(library: &ImageLibrary, content: &'static [u8], name: &str) -> ImageRecord {
    library
        .upload(
            Bytes::from_static(content),
            name,
            content.len() as u64,
            "image/png",
        )
        .await
        .expect("upload")
}
