//! PostgreSQL metadata store tests.
//!
//! Run with `--features postgres -- --ignored` against a scratch database.

#![cfg(feature = "postgres")]

use picstash_core::{
    BlobKey, ContentHash, ImageUpdate, ListQuery, NewImageRecord, TagFilter, TagValue,
};
use picstash_database::{MetadataStore, PostgresMetadataStore, establish_pool, run_migrations};

fn load_store() -> PostgresMetadataStore {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = establish_pool(&url, 4).expect("pool");
    run_migrations(&pool).expect("migrations");
    PostgresMetadataStore::new(pool)
}

fn new_record(title: &str, content: &[u8], key: &BlobKey) -> NewImageRecord {
    NewImageRecord {
        title: title.to_string(),
        description: String::new(),
        lock_file: false,
        file_size: content.len() as u64,
        file_type: "image/png".to_string(),
        blob_key: key.clone(),
        content_hash: ContentHash::compute(content),
        tags: vec![],
    }
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_postgres_record_lifecycle() {
    let store = load_store();
    let key = BlobKey::generate();
    let unique = uuid_bytes();

    let record = store.create(new_record("pg", &unique, &key)).await.unwrap();
    assert_eq!(record.version, 1);
    assert_eq!(store.count_by_blob_key(&key).await.unwrap(), 1);

    let found = store
        .get_by_hash(&record.content_hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, record.id);

    let updated = store
        .update(
            record.id,
            ImageUpdate {
                title: Some("renamed".to_string()),
                expected_version: Some(1),
                ..ImageUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.version, 2);

    let stale = store
        .update(
            record.id,
            ImageUpdate {
                title: Some("lost".to_string()),
                expected_version: Some(1),
                ..ImageUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(stale.is_version_conflict());

    assert!(store.delete(record.id).await.unwrap());
    assert!(store.get_by_id(record.id).await.unwrap().is_none());
    assert_eq!(store.count_by_blob_key(&key).await.unwrap(), 0);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_postgres_tags_and_filtering() {
    let store = load_store();
    let label = format!("tag-{}", BlobKey::generate());
    let red = store
        .get_or_create_tag(&TagValue::new(label.clone(), "red"))
        .await
        .unwrap();
    let again = store
        .get_or_create_tag(&TagValue::new(label.clone(), "red"))
        .await
        .unwrap();
    assert_eq!(red, again);
    let blue = store
        .get_or_create_tag(&TagValue::new(label, "blue"))
        .await
        .unwrap();

    let key = BlobKey::generate();
    let mut both = new_record("both", &uuid_bytes(), &key);
    both.tags = vec![red.clone(), blue.clone()];
    let both = store.create(both).await.unwrap();
    let mut only_red = new_record("red", &uuid_bytes(), &key);
    only_red.tags = vec![red.clone()];
    store.create(only_red).await.unwrap();

    let all = ListQuery::builder()
        .tag_filter(TagFilter::all([red.id, blue.id]))
        .build()
        .unwrap();
    let result = store.list(&all).await.unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.data[0].id, both.id);
    assert_eq!(result.data[0].tags, vec![red.clone(), blue.clone()]);

    let any = ListQuery::builder()
        .tag_filter(TagFilter::any([red.id, blue.id]))
        .include_duplicates(false)
        .build()
        .unwrap();
    assert_eq!(store.list(&any).await.unwrap().total, 2);
}

fn uuid_bytes() -> Vec<u8> {
    BlobKey::generate().as_str().as_bytes().to_vec()
}
