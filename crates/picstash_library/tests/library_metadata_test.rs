//! Metadata edits, tag resolution and listing through the library.

mod common;

use common::{harness, upload};
use picstash_core::{MetadataPatch, SortKey, SortOrder, TagFilter, TagValue};
use picstash_error::ErrorClass;
use std::collections::HashSet;

fn tags(values: &[(&str, &str)]) -> MetadataPatch {
    MetadataPatch {
        tags: Some(
            values
                .iter()
                .map(|(label, color)| TagValue::new(*label, *color))
                .collect(),
        ),
        ..MetadataPatch::default()
    }
}

#[tokio::test]
async fn test_update_metadata_leaves_binding_alone() {
    let h = harness();
    let record = upload(&h.library, b"meta", "old.png").await;

    let updated = h
        .library
        .update_metadata(
            record.id,
            MetadataPatch {
                title: Some("new title".to_string()),
                description: Some("a rubber chicken".to_string()),
                ..MetadataPatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "new title");
    assert_eq!(updated.description, "a rubber chicken");
    assert_eq!(updated.blob_key, record.blob_key);
    assert_eq!(updated.content_hash, record.content_hash);
    assert_eq!(updated.file_updated_at, record.file_updated_at);
    assert!(updated.updated_at >= record.updated_at);
}

#[tokio::test]
async fn test_locked_record_still_accepts_metadata_edits() {
    let h = harness();
    let record = upload(&h.library, b"locked meta", "r.png").await;
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

    let updated = h
        .library
        .update_metadata(
            record.id,
            MetadataPatch {
                title: Some("renamed while locked".to_string()),
                ..MetadataPatch::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.lock_file);
    assert_eq!(updated.title, "renamed while locked");
}

#[tokio::test]
async fn test_tags_resolve_to_one_tag_per_value() {
    let h = harness();
    let r1 = upload(&h.library, b"t1", "1.png").await;
    let r2 = upload(&h.library, b"t2", "2.png").await;

    let u1 = h
        .library
        .update_metadata(r1.id, tags(&[("chicken", "yellow"), ("chicken", "yellow")]))
        .await
        .unwrap();
    let u2 = h
        .library
        .update_metadata(r2.id, tags(&[("chicken", "yellow"), ("chicken", "red")]))
        .await
        .unwrap();

    assert_eq!(u1.tags.len(), 1);
    assert_eq!(u1.tags[0], u2.tags[0]);
    assert_ne!(u2.tags[0].id, u2.tags[1].id);
    assert_eq!(h.metadata.tag_count().await, 2);
}

#[tokio::test]
async fn test_update_missing_record_creates_no_tags() {
    let h = harness();

    let err = h
        .library
        .update_metadata(picstash_core::ImageId::new(), tags(&[("ghost", "white")]))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::NotFound);
    assert_eq!(h.metadata.tag_count().await, 0);
}

#[tokio::test]
async fn test_listing_by_tag_mode() {
    let h = harness();
    let both = upload(&h.library, b"both", "both.png").await;
    let first = upload(&h.library, b"first", "first.png").await;
    let second = upload(&h.library, b"second", "second.png").await;
    upload(&h.library, b"none", "none.png").await;

    let both = h
        .library
        .update_metadata(both.id, tags(&[("t1", "red"), ("t2", "blue")]))
        .await
        .unwrap();
    h.library
        .update_metadata(first.id, tags(&[("t1", "red")]))
        .await
        .unwrap();
    h.library
        .update_metadata(second.id, tags(&[("t2", "blue")]))
        .await
        .unwrap();
    let t1 = both.tags[0].id;
    let t2 = both.tags[1].id;

    let all = h
        .library
        .query_builder()
        .tag_filter(TagFilter::all([t1, t2]))
        .build()
        .unwrap();
    let result = h.library.list(&all).await.unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.data[0].id, both.id);

    let any = h
        .library
        .query_builder()
        .tag_filter(TagFilter::any([t1, t2]))
        .sort_key(SortKey::Title)
        .sort_order(SortOrder::Asc)
        .build()
        .unwrap();
    let result = h.library.list(&any).await.unwrap();
    let titles: Vec<_> = result.data.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["both.png", "first.png", "second.png"]);
}

#[tokio::test]
async fn test_listing_without_duplicates_has_unique_hashes() {
    let h = harness();
    for (content, name) in [
        (b"x".as_slice(), "x1"),
        (b"y".as_slice(), "y1"),
        (b"x".as_slice(), "x2"),
        (b"z".as_slice(), "z1"),
        (b"y".as_slice(), "y2"),
    ] {
        h.library
            .upload(bytes::Bytes::copy_from_slice(content), name, 1, "image/png")
            .await
            .unwrap();
    }

    let query = h
        .library
        .query_builder()
        .include_duplicates(false)
        .size(2usize)
        .build()
        .unwrap();
    let page = h.library.list(&query).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.length, 2);

    let everything = h
        .library
        .query_builder()
        .include_duplicates(false)
        .build()
        .unwrap();
    let result = h.library.list(&everything).await.unwrap();
    let hashes: HashSet<_> = result.data.iter().map(|r| r.content_hash.clone()).collect();
    assert_eq!(hashes.len(), result.data.len());
    assert_eq!(result.total, 3);

    let with_duplicates = h.library.query_builder().build().unwrap();
    assert_eq!(h.library.list(&with_duplicates).await.unwrap().total, 5);
}

#[tokio::test]
async fn test_oversized_page_is_rejected() {
    let h = harness();
    let query = h.library.query_builder().size(101usize).build().unwrap();

    let err = h.library.list(&query).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::InvalidInput);
}
