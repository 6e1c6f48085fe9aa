//! Listing engine shared by every metadata backend.
//!
//! Order of operations:
//!
//! 1. tag filter
//! 2. duplicate collapse (only when `include_duplicates` is false): the first
//!    record per content hash in insertion order survives
//! 3. sort, stable, so ties keep insertion order
//! 4. `total` is taken here, then the offset/size window is applied
//!
//! Backends that can push some steps into their query language call the
//! individual steps directly; [`run`] performs all of them.

use picstash_core::{ImageRecord, ListQuery, SearchResult, SortKey, SortOrder};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Run `query` over `records`, which must be in insertion order.
pub fn run(records: impl IntoIterator<Item = ImageRecord>, query: &ListQuery) -> SearchResult {
    let filtered: Vec<ImageRecord> = records.into_iter().filter(|r| query.matches(r)).collect();
    finish(filtered, query)
}

/// Steps 2-4 for records that already passed the tag filter, in insertion order.
pub fn finish(filtered: Vec<ImageRecord>, query: &ListQuery) -> SearchResult {
    let mut selected = if *query.include_duplicates() {
        filtered
    } else {
        collapse_duplicates(filtered)
    };
    sort_records(&mut selected, *query.sort_key(), *query.sort_order());

    let total = selected.len() as u64;
    let page = paginate(selected, *query.offset(), *query.size());
    SearchResult::new(page, total, query)
}

/// Keep the first record for each content hash.
pub fn collapse_duplicates(records: Vec<ImageRecord>) -> Vec<ImageRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.content_hash.clone()))
        .collect()
}

/// Stable sort by `key` in `order`.
pub fn sort_records(records: &mut [ImageRecord], key: SortKey, order: SortOrder) {
    records.sort_by(|a, b| {
        let ord = compare(a, b, key);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

fn compare(a: &ImageRecord, b: &ImageRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortKey::FileUpdatedAt => a.file_updated_at.cmp(&b.file_updated_at),
        SortKey::Title => a.title.cmp(&b.title),
        SortKey::FileSize => a.file_size.cmp(&b.file_size),
    }
}

/// Apply the offset/size window.
pub fn paginate(records: Vec<ImageRecord>, offset: usize, size: usize) -> Vec<ImageRecord> {
    records.into_iter().skip(offset).take(size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use picstash_core::{BlobKey, ContentHash, ImageId, Tag, TagFilter, TagId};

    fn record(title: &str, content: &[u8], size: u64, minute: i64, tags: &[Tag]) -> ImageRecord {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        ImageRecord {
            id: ImageId::new(),
            title: title.to_string(),
            description: String::new(),
            lock_file: false,
            created_at: at,
            updated_at: at,
            file_updated_at: at,
            file_size: size,
            file_type: "image/png".to_string(),
            blob_key: BlobKey::generate(),
            content_hash: ContentHash::compute(content),
            tags: tags.to_vec(),
            version: 1,
        }
    }

    fn tag(label: &str) -> Tag {
        Tag {
            id: TagId::new(),
            label: label.to_string(),
            color: "red".to_string(),
        }
    }

    fn titles(result: &SearchResult) -> Vec<&str> {
        result.data.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn default_sort_is_newest_first() {
        let records = vec![
            record("a", b"1", 1, 0, &[]),
            record("b", b"2", 1, 2, &[]),
            record("c", b"3", 1, 1, &[]),
        ];
        let result = run(records, &ListQuery::default());
        assert_eq!(titles(&result), vec!["b", "c", "a"]);
        assert_eq!(result.total, 3);
    }

    #[test]
    fn collapse_keeps_first_inserted_then_sorts() {
        let records = vec![
            record("first", b"same", 5, 0, &[]),
            record("other", b"different", 1, 1, &[]),
            record("second", b"same", 9, 2, &[]),
        ];
        let query = ListQuery::builder()
            .include_duplicates(false)
            .sort_key(SortKey::FileSize)
            .sort_order(SortOrder::Desc)
            .build()
            .unwrap();

        let result = run(records, &query);
        assert_eq!(titles(&result), vec!["first", "other"]);
        assert_eq!(result.total, 2);
    }

    #[test]
    fn total_counts_before_pagination() {
        let records: Vec<_> = (0..7)
            .map(|i| record(&format!("r{}", i), &[i as u8], i as u64, i as i64, &[]))
            .collect();
        let query = ListQuery::builder()
            .sort_key(SortKey::FileSize)
            .sort_order(SortOrder::Asc)
            .offset(5usize)
            .size(5usize)
            .build()
            .unwrap();

        let result = run(records, &query);
        assert_eq!(result.total, 7);
        assert_eq!(result.length, 2);
        assert_eq!(titles(&result), vec!["r5", "r6"]);
    }

    #[test]
    fn tag_modes_filter_before_collapse() {
        let t1 = tag("t1");
        let t2 = tag("t2");
        let records = vec![
            record("both", b"x", 1, 0, &[t1.clone(), t2.clone()]),
            record("only-t1", b"y", 1, 1, &[t1.clone()]),
            record("none", b"z", 1, 2, &[]),
        ];

        let all = ListQuery::builder()
            .tag_filter(TagFilter::all([t1.id, t2.id]))
            .build()
            .unwrap();
        assert_eq!(titles(&run(records.clone(), &all)), vec!["both"]);

        let any = ListQuery::builder()
            .tag_filter(TagFilter::any([t1.id, t2.id]))
            .build()
            .unwrap();
        assert_eq!(titles(&run(records, &any)), vec!["only-t1", "both"]);
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let records = vec![
            record("x", b"1", 3, 0, &[]),
            record("y", b"2", 3, 1, &[]),
            record("z", b"3", 3, 2, &[]),
        ];
        let query = ListQuery::builder()
            .sort_key(SortKey::FileSize)
            .build()
            .unwrap();
        assert_eq!(titles(&run(records, &query)), vec!["x", "y", "z"]);
    }
}
