//! Record deletion and reference-count tests.

mod common;

use common::{harness, upload};
use picstash_core::MetadataPatch;
use picstash_database::MetadataStore;
use picstash_error::ErrorClass;
use picstash_storage::BlobStore;

#[tokio::test]
async fn test_shared_blob_survives_until_last_referent_is_deleted() {
    let h = harness();
    let r1 = upload(&h.library, b"shared bytes", "r1.png").await;
    let r2 = upload(&h.library, b"shared bytes", "r2.png").await;
    let key = r1.blob_key.clone();

    h.library.delete_record(r1.id).await.unwrap();

    assert!(h.blobs.inner.exists(&key).await.unwrap());
    assert!(h.blobs.deletes().await.is_empty());
    assert!(h.metadata.get_by_id(r1.id).await.unwrap().is_none());
    assert_eq!(h.metadata.count_by_blob_key(&key).await.unwrap(), 1);

    h.library.delete_record(r2.id).await.unwrap();

    assert!(!h.blobs.inner.exists(&key).await.unwrap());
    assert_eq!(h.blobs.deletes().await, vec![key.clone()]);
    assert!(h.metadata.is_empty().await);
}

#[tokio::test]
async fn test_locked_record_cannot_be_deleted() {
    let h = harness();
    let record = upload(&h.library, b"keep me", "r.png").await;
    h.library
        .update_metadata(
            record.id,
            MetadataPatch {
                lock_file: Some(true),
                ..MetadataPatch::default()
            },
        )
        .await
        .unwrap();

    let err = h.library.delete_record(record.id).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Locked);
    assert!(h.metadata.get_by_id(record.id).await.unwrap().is_some());
    assert!(h.blobs.inner.exists(&record.blob_key).await.unwrap());
    assert!(h.blobs.deletes().await.is_empty());
}

#[tokio::test]
async fn test_unlocking_allows_delete() {
    let h = harness();
    let record = upload(&h.library, b"toggle", "r.png").await;
    let lock = |flag| MetadataPatch {
        lock_file: Some(flag),
        ..MetadataPatch::default()
    };

    h.library.update_metadata(record.id, lock(true)).await.unwrap();
    h.library.update_metadata(record.id, lock(false)).await.unwrap();
    h.library.delete_record(record.id).await.unwrap();

    assert!(h.metadata.is_empty().await);
    assert!(h.blobs.inner.is_empty().await);
}

#[tokio::test]
async fn test_missing_blob_does_not_block_delete() {
    let h = harness();
    let record = upload(&h.library, b"vanishing", "r.png").await;
    h.blobs.inner.delete(&record.blob_key).await.unwrap();

    h.library.delete_record(record.id).await.unwrap();

    assert!(h.metadata.get_by_id(record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_missing_record_is_not_found() {
    let h = harness();
    let err = h
        .library
        .delete_record(picstash_core::ImageId::new())
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::NotFound);
    assert!(h.blobs.deletes().await.is_empty());
}

#[tokio::test]
async fn test_blob_deleted_only_when_unreferenced() {
    let h = harness();
    let a = upload(&h.library, b"alpha", "a.png").await;
    let b = upload(&h.library, b"alpha", "b.png").await;
    let c = upload(&h.library, b"beta", "c.png").await;

    h.library
        .replace_file(a.id, bytes::Bytes::from_static(b"beta"), 4, "image/png")
        .await
        .unwrap();
    h.library.delete_record(c.id).await.unwrap();
    h.library.delete_record(b.id).await.unwrap();

    for key in h.blobs.deletes().await {
        assert_eq!(h.metadata.count_by_blob_key(&key).await.unwrap(), 0);
    }
    assert_eq!(h.blobs.deletes().await, vec![b.blob_key.clone()]);
    assert!(h.blobs.inner.exists(&c.blob_key).await.unwrap());
    assert_eq!(h.metadata.count_by_blob_key(&c.blob_key).await.unwrap(), 1);
}
