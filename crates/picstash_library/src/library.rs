//! The dedup and reference-counting engine.

use crate::LibraryConfig;
use bytes::Bytes;
use picstash_core::{
    BlobBinding, BlobKey, ContentHash, ImageId, ImageRecord, ImageUpdate, ListQuery,
    ListQueryBuilder, MetadataPatch, NewImageRecord, SearchResult, Tag, TagValue,
};
use picstash_database::MetadataStore;
use picstash_error::{
    LibraryError, LibraryErrorKind, PicstashError, PicstashErrorKind, PicstashResult,
};
use picstash_storage::{BlobStore, BlobStream};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Image library tying metadata records to deduplicated blobs.
///
/// Identical bytes are stored once; every record pointing at a blob counts
/// as a reference, and a blob is only removed once nothing references it.
/// The engine holds no lock across store calls. Blob-binding changes go
/// through a conditional update and are retried when another writer got
/// there first.
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use picstash_database::InMemoryMetadataStore;
/// use picstash_library::ImageLibrary;
/// use picstash_storage::InMemoryBlobStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let library = ImageLibrary::new(
///     Arc::new(InMemoryMetadataStore::new()),
///     Arc::new(InMemoryBlobStore::new()),
/// );
///
/// let bytes = Bytes::from_static(b"\x89PNG chicken");
/// let first = library.upload(bytes.clone(), "a.png", 13, "image/png").await?;
/// let second = library.upload(bytes, "b.png", 13, "image/png").await?;
/// assert_eq!(first.blob_key, second.blob_key);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ImageLibrary {
    pub(crate) metadata: Arc<dyn MetadataStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    config: LibraryConfig,
}

impl std::fmt::Debug for ImageLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLibrary")
            .field("metadata", &self.metadata.backend_name())
            .field("blobs", &self.blobs.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

impl ImageLibrary {
    /// Create a library with default settings.
    pub fn new(metadata: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self::with_config(metadata, blobs, LibraryConfig::default())
    }

    /// Create a library with explicit settings.
    pub fn with_config(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        config: LibraryConfig,
    ) -> Self {
        info!(
            metadata_backend = metadata.backend_name(),
            blob_backend = blobs.backend_name(),
            "Image library ready"
        );
        Self {
            metadata,
            blobs,
            config,
        }
    }

    /// Engine settings.
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Query builder seeded with the configured page size.
    pub fn query_builder(&self) -> ListQueryBuilder {
        let mut builder = ListQuery::builder();
        builder.size(*self.config.default_page_size());
        builder
    }

    /// Store an uploaded file as a new record.
    ///
    /// If a record with identical content exists, the new record shares its
    /// blob and nothing is written to the blob store.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty payload
    /// - store failures, unchanged
    #[instrument(skip_all, fields(display_name = %display_name, size = bytes.len(), content_type = %content_type))]
    pub async fn upload(
        &self,
        bytes: Bytes,
        display_name: &str,
        size: u64,
        content_type: &str,
    ) -> PicstashResult<ImageRecord> {
        let size = checked_size(&bytes, size)?;
        let hash = ContentHash::compute(&bytes);

        let blob_key = match self.metadata.get_by_hash(&hash).await? {
            Some(existing) => {
                debug!(
                    hash = %hash,
                    existing_id = %existing.id,
                    blob_key = %existing.blob_key,
                    "Content already stored, reusing blob"
                );
                existing.blob_key
            }
            None => {
                let key = BlobKey::generate();
                self.blobs.put(&key, bytes, content_type).await?;
                info!(hash = %hash, blob_key = %key, size, "Stored new blob");
                key
            }
        };

        let record = self
            .metadata
            .create(NewImageRecord {
                title: display_name.to_string(),
                description: String::new(),
                lock_file: false,
                file_size: size,
                file_type: content_type.to_string(),
                blob_key,
                content_hash: hash,
                tags: Vec::new(),
            })
            .await?;

        info!(image_id = %record.id, blob_key = %record.blob_key, "Created image record");
        Ok(record)
    }

    /// Replace the file bound to an existing record.
    ///
    /// When the new content already exists under another blob the record is
    /// rebound to it, and the old blob is deleted if that left it
    /// unreferenced. Otherwise the bytes overwrite the record's current blob
    /// in place, which every record sharing that blob will observe; their
    /// stored `content_hash` still names the old content.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record does not exist
    /// - `Locked` if the record is locked
    /// - `InvalidInput` for an empty payload
    /// - `Conflict` if concurrent writers kept changing the record
    #[instrument(skip_all, fields(image_id = %id, size = bytes.len()))]
    pub async fn replace_file(
        &self,
        id: ImageId,
        bytes: Bytes,
        size: u64,
        content_type: &str,
    ) -> PicstashResult<ImageRecord> {
        let size = checked_size(&bytes, size)?;
        let hash = ContentHash::compute(&bytes);
        let attempts = *self.config.max_update_attempts();

        for attempt in 1..=attempts {
            match self
                .try_replace(id, &bytes, &hash, size, content_type)
                .await
            {
                Err(e) if is_version_conflict(&e) => {
                    debug!(attempt, "Record changed underneath replace, retrying");
                }
                result => return result,
            }
        }

        warn!(attempts, "Giving up on replace after repeated version conflicts");
        Err(LibraryError::new(LibraryErrorKind::Conflict {
            id: id.to_string(),
            attempts,
        })
        .into())
    }

    async fn try_replace(
        &self,
        id: ImageId,
        bytes: &Bytes,
        hash: &ContentHash,
        size: u64,
        content_type: &str,
    ) -> PicstashResult<ImageRecord> {
        let target = self.require(id).await?;
        ensure_unlocked(&target)?;

        let binding = |blob_key: BlobKey| BlobBinding {
            blob_key,
            content_hash: hash.clone(),
            file_size: size,
            file_type: content_type.to_string(),
        };

        match self.metadata.get_by_hash(hash).await? {
            Some(duplicate) if duplicate.blob_key != target.blob_key => {
                let rebind = ImageUpdate::rebind(binding(duplicate.blob_key), target.version);
                let updated = self.metadata.update(id, rebind).await?;
                info!(
                    old_blob_key = %target.blob_key,
                    blob_key = %updated.blob_key,
                    "Rebound record to existing blob"
                );

                self.release_blob(&target.blob_key).await?;
                Ok(updated)
            }
            Some(_) => {
                debug!(blob_key = %target.blob_key, "Content already bound, refreshing metadata");
                let refresh = ImageUpdate::rebind(binding(target.blob_key), target.version);
                Ok(self.metadata.update(id, refresh).await?)
            }
            None => {
                self.blobs
                    .put(&target.blob_key, bytes.clone(), content_type)
                    .await?;
                info!(blob_key = %target.blob_key, hash = %hash, "Overwrote blob in place");

                let rebind = ImageUpdate::rebind(binding(target.blob_key), target.version);
                Ok(self.metadata.update(id, rebind).await?)
            }
        }
    }

    /// Delete a record, and its blob when this record is the last referent.
    ///
    /// The blob is deleted before the metadata. If the metadata delete then
    /// fails, the record is left pointing at a missing blob until
    /// [`ImageLibrary::reconcile`] reports it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record does not exist
    /// - `Locked` if the record is locked
    #[instrument(skip_all, fields(image_id = %id))]
    pub async fn delete_record(&self, id: ImageId) -> PicstashResult<()> {
        let record = self.require(id).await?;
        ensure_unlocked(&record)?;

        let references = self.metadata.count_by_blob_key(&record.blob_key).await?;
        if references <= 1 {
            self.delete_blob(&record.blob_key).await?;
        } else {
            debug!(
                blob_key = %record.blob_key,
                references,
                "Blob shared with other records, keeping"
            );
        }

        self.metadata.delete(id).await?;
        info!(blob_key = %record.blob_key, "Deleted image record");
        Ok(())
    }

    /// Edit title, description, lock flag or tags.
    ///
    /// Tags are resolved by value, creating them on first use. The blob
    /// binding is never touched, so this works on locked records too.
    #[instrument(skip_all, fields(image_id = %id))]
    pub async fn update_metadata(
        &self,
        id: ImageId,
        patch: MetadataPatch,
    ) -> PicstashResult<ImageRecord> {
        self.require(id).await?;

        let tags = match &patch.tags {
            Some(values) => Some(self.resolve_tags(values).await?),
            None => None,
        };

        let updated = self
            .metadata
            .update(
                id,
                ImageUpdate {
                    title: patch.title,
                    description: patch.description,
                    lock_file: patch.lock_file,
                    tags,
                    ..ImageUpdate::default()
                },
            )
            .await?;

        debug!(version = updated.version, "Updated image metadata");
        Ok(updated)
    }

    /// Resolve tag values to tags, dropping repeats and keeping first-seen order.
    pub async fn resolve_tags(&self, values: &[TagValue]) -> PicstashResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = Vec::with_capacity(values.len());
        for value in values {
            let tag = self.metadata.get_or_create_tag(value).await?;
            if !tags.iter().any(|t| t.id == tag.id) {
                tags.push(tag);
            }
        }
        Ok(tags)
    }

    /// Load a record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the record does not exist.
    pub async fn get_metadata(&self, id: ImageId) -> PicstashResult<ImageRecord> {
        self.require(id).await
    }

    /// Load a record together with a stream of its file content.
    #[instrument(skip_all, fields(image_id = %id))]
    pub async fn get_file_stream(&self, id: ImageId) -> PicstashResult<(ImageRecord, BlobStream)> {
        let record = self.require(id).await?;
        let stream = self.blobs.get_stream(&record.blob_key).await?;
        Ok((record, stream))
    }

    /// Run a listing query.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the page size exceeds the configured maximum.
    #[instrument(skip_all, fields(sort_key = %query.sort_key(), offset = *query.offset(), size = *query.size()))]
    pub async fn list(&self, query: &ListQuery) -> PicstashResult<SearchResult> {
        let max = *self.config.max_page_size();
        if *query.size() > max {
            return Err(LibraryError::new(LibraryErrorKind::InvalidInput(format!(
                "page size {} exceeds maximum {}",
                query.size(),
                max
            )))
            .into());
        }

        let result = self.metadata.list(query).await?;
        debug!(total = result.total, length = result.length, "Listed images");
        Ok(result)
    }

    /// Every key held by the blob store.
    pub async fn list_blob_keys(&self) -> PicstashResult<Vec<BlobKey>> {
        Ok(self.blobs.list_keys().await?)
    }

    async fn require(&self, id: ImageId) -> PicstashResult<ImageRecord> {
        match self.metadata.get_by_id(id).await? {
            Some(record) => Ok(record),
            None => Err(LibraryError::new(LibraryErrorKind::NotFound(id.to_string())).into()),
        }
    }

    /// Delete `key` if no record references it any more. Returns whether a
    /// blob was removed.
    pub(crate) async fn release_blob(&self, key: &BlobKey) -> PicstashResult<bool> {
        let references = self.metadata.count_by_blob_key(key).await?;
        if references > 0 {
            debug!(blob_key = %key, references, "Blob still referenced, keeping");
            return Ok(false);
        }
        self.delete_blob(key).await
    }

    async fn delete_blob(&self, key: &BlobKey) -> PicstashResult<bool> {
        match self.blobs.delete(key).await {
            Ok(()) => {
                info!(blob_key = %key, "Deleted blob");
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                warn!(blob_key = %key, "Blob already missing from store");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn ensure_unlocked(record: &ImageRecord) -> Result<(), LibraryError> {
    if record.lock_file {
        return Err(LibraryError::new(LibraryErrorKind::Locked(
            record.id.to_string(),
        )));
    }
    Ok(())
}

/// Payload length wins over the declared size.
fn checked_size(bytes: &Bytes, declared: u64) -> Result<u64, LibraryError> {
    if bytes.is_empty() {
        return Err(LibraryError::new(LibraryErrorKind::InvalidInput(
            "empty payload".to_string(),
        )));
    }

    let actual = bytes.len() as u64;
    if actual != declared {
        warn!(declared, actual, "Declared size disagrees with payload");
    }
    Ok(actual)
}

fn is_version_conflict(err: &PicstashError) -> bool {
    matches!(err.kind(), PicstashErrorKind::Database(e) if e.is_version_conflict())
}
