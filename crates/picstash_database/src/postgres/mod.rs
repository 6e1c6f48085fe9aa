//! PostgreSQL implementation of [`MetadataStore`].
//!
//! Diesel is synchronous, so every call checks a connection out of an r2d2
//! pool and runs on tokio's blocking thread pool.
//!
//! Insertion order is carried by the `seq` column. Listings without duplicate
//! collapsing are pushed into SQL entirely; collapsed listings load the
//! filtered rows in `seq` order and finish in [`crate::listing`], so both
//! backends agree on which record represents a hash.

mod models;
mod schema;

use crate::{DatabaseResult, MetadataStore, listing};
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use models::{ImageChangeset, ImageRow, ImageTagRow, NewImageRow, TagRow};
use picstash_core::{
    BlobKey, ContentHash, ImageId, ImageRecord, ImageUpdate, ListQuery, NewImageRecord,
    SearchResult, SortKey, SortOrder, Tag, TagFilter, TagMatch, TagValue,
};
use picstash_error::{DatabaseError, DatabaseErrorKind};
use schema::{image_tags, images, tags};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Pooled PostgreSQL connections.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Build a connection pool for `database_url` and check one connection out.
///
/// # Errors
///
/// Returns `Connection` if the pool cannot be built or the warm-up checkout fails.
pub fn establish_pool(database_url: &str, max_size: u32) -> DatabaseResult<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Connection(format!(
                "Failed to create connection pool: {}",
                e
            )))
        })?;

    {
        let _conn = pool.get().map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Connection(format!(
                "Failed to warm up connection pool: {}",
                e
            )))
        })?;
    }

    info!(max_size, "PostgreSQL connection pool ready");
    Ok(pool)
}

/// Run pending migrations.
pub fn run_migrations(pool: &PgPool) -> DatabaseResult<()> {
    use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get().map_err(|e| {
        DatabaseError::new(DatabaseErrorKind::Connection(format!(
            "Failed to get connection from pool: {}",
            e
        )))
    })?;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Migration(e.to_string())))?;
    info!(count = applied.len(), "Applied pending migrations");
    Ok(())
}

/// Metadata store backed by PostgreSQL.
///
/// # Example
///
/// ```no_run
/// use picstash_database::{PostgresMetadataStore, establish_pool, run_migrations};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = establish_pool("postgres://localhost/picstash", 10)?;
/// run_migrations(&pool)?;
/// let store = PostgresMetadataStore::new(pool);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresMetadataStore {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresMetadataStore")
            .field("pool_state", &self.pool.state())
            .finish()
    }
}

impl PostgresMetadataStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut PgConnection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| {
                DatabaseError::new(DatabaseErrorKind::Connection(format!(
                    "Failed to get connection from pool: {}",
                    e
                )))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Query(format!("Task join error: {}", e)))
        })?
    }
}

/// Tags for each of `ids`, in list order.
fn load_tags(conn: &mut PgConnection, ids: &[Uuid]) -> DatabaseResult<HashMap<Uuid, Vec<Tag>>> {
    let rows: Vec<(Uuid, TagRow)> = image_tags::table
        .inner_join(tags::table)
        .filter(image_tags::image_id.eq_any(ids))
        .order((image_tags::image_id, image_tags::position))
        .select((image_tags::image_id, TagRow::as_select()))
        .load(conn)?;

    let mut by_image: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for (image_id, row) in rows {
        by_image.entry(image_id).or_default().push(row.into());
    }
    Ok(by_image)
}

/// Attach tags to `rows`, keeping their order.
fn into_records(conn: &mut PgConnection, rows: Vec<ImageRow>) -> DatabaseResult<Vec<ImageRecord>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut tags = load_tags(conn, &ids)?;
    rows.into_iter()
        .map(|row| {
            let attached = tags.remove(&row.id).unwrap_or_default();
            row.into_record(attached)
        })
        .collect()
}

fn into_record(conn: &mut PgConnection, row: ImageRow) -> DatabaseResult<ImageRecord> {
    let mut tags = load_tags(conn, &[row.id])?;
    let attached = tags.remove(&row.id).unwrap_or_default();
    row.into_record(attached)
}

/// Images passing `filter`. All-mode adds one membership test per tag.
fn filtered(filter: Option<&TagFilter>) -> images::BoxedQuery<'static, Pg> {
    let mut query = images::table.into_boxed();
    let Some(filter) = filter.filter(|f| !f.is_empty()) else {
        return query;
    };

    let tag_ids: Vec<Uuid> = filter.tags.iter().map(|t| *t.as_uuid()).collect();
    match filter.mode {
        TagMatch::Any => {
            query = query.filter(
                images::id.eq_any(
                    image_tags::table
                        .filter(image_tags::tag_id.eq_any(tag_ids))
                        .select(image_tags::image_id),
                ),
            );
        }
        TagMatch::All => {
            for tag_id in tag_ids {
                query = query.filter(
                    images::id.eq_any(
                        image_tags::table
                            .filter(image_tags::tag_id.eq(tag_id))
                            .select(image_tags::image_id),
                    ),
                );
            }
        }
    }
    query
}

macro_rules! order_by {
    ($query:expr, $column:expr, $order:expr) => {
        match $order {
            SortOrder::Asc => $query.order_by($column.asc()),
            SortOrder::Desc => $query.order_by($column.desc()),
        }
    };
}

/// Apply the sort key, breaking ties by insertion order.
fn sorted(
    query: images::BoxedQuery<'static, Pg>,
    key: SortKey,
    order: SortOrder,
) -> images::BoxedQuery<'static, Pg> {
    let query = match key {
        SortKey::CreatedAt => order_by!(query, images::created_at, order),
        SortKey::UpdatedAt => order_by!(query, images::updated_at, order),
        SortKey::FileUpdatedAt => order_by!(query, images::file_updated_at, order),
        SortKey::Title => order_by!(query, images::title, order),
        SortKey::FileSize => order_by!(query, images::file_size, order),
    };
    query.then_order_by(images::seq.asc())
}

fn to_sql_window(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    #[instrument(skip(self, record), fields(blob_key = %record.blob_key))]
    async fn create(&self, record: NewImageRecord) -> DatabaseResult<ImageRecord> {
        self.with_conn(move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let row = NewImageRow::from_new(Uuid::new_v4(), &record, Utc::now())?;
                let inserted: ImageRow = diesel::insert_into(images::table)
                    .values(&row)
                    .returning(ImageRow::as_returning())
                    .get_result(conn)?;

                let links = ImageTagRow::for_tags(inserted.id, &record.tags);
                if !links.is_empty() {
                    diesel::insert_into(image_tags::table)
                        .values(&links)
                        .execute(conn)?;
                }

                debug!(id = %inserted.id, "Inserted image record");
                inserted.into_record(record.tags.clone())
            })
        })
        .await
    }

    async fn get_by_id(&self, id: ImageId) -> DatabaseResult<Option<ImageRecord>> {
        let uuid = *id.as_uuid();
        self.with_conn(move |conn| {
            let row: Option<ImageRow> = images::table
                .find(uuid)
                .select(ImageRow::as_select())
                .first(conn)
                .optional()?;
            row.map(|row| into_record(conn, row)).transpose()
        })
        .await
    }

    async fn get_by_hash(&self, hash: &ContentHash) -> DatabaseResult<Option<ImageRecord>> {
        let hash = hash.as_str().to_string();
        self.with_conn(move |conn| {
            let row: Option<ImageRow> = images::table
                .filter(images::content_hash.eq(hash))
                .order(images::seq.asc())
                .select(ImageRow::as_select())
                .first(conn)
                .optional()?;
            row.map(|row| into_record(conn, row)).transpose()
        })
        .await
    }

    #[instrument(skip_all, fields(id = %id, expected_version = ?update.expected_version))]
    async fn update(&self, id: ImageId, update: ImageUpdate) -> DatabaseResult<ImageRecord> {
        let uuid = *id.as_uuid();
        self.with_conn(move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let current: ImageRow = images::table
                    .find(uuid)
                    .select(ImageRow::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| {
                        DatabaseError::new(DatabaseErrorKind::NotFound(uuid.to_string()))
                    })?;

                if let Some(expected) = update.expected_version
                    && i64::try_from(expected).ok() != Some(current.version)
                {
                    return Err(DatabaseError::new(DatabaseErrorKind::VersionConflict {
                        id: uuid.to_string(),
                        expected,
                        actual: u64::try_from(current.version).unwrap_or_default(),
                    }));
                }

                let changes = ImageChangeset::from_update(&update, current.version, Utc::now())?;
                let updated: ImageRow = diesel::update(images::table.find(uuid))
                    .set(&changes)
                    .returning(ImageRow::as_returning())
                    .get_result(conn)?;

                if let Some(tags) = &update.tags {
                    diesel::delete(image_tags::table.filter(image_tags::image_id.eq(uuid)))
                        .execute(conn)?;
                    let links = ImageTagRow::for_tags(uuid, tags);
                    if !links.is_empty() {
                        diesel::insert_into(image_tags::table)
                            .values(&links)
                            .execute(conn)?;
                    }
                }

                into_record(conn, updated)
            })
        })
        .await
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn delete(&self, id: ImageId) -> DatabaseResult<bool> {
        let uuid = *id.as_uuid();
        self.with_conn(move |conn| {
            let removed = diesel::delete(images::table.find(uuid)).execute(conn)?;
            Ok(removed > 0)
        })
        .await
    }

    async fn count_by_blob_key(&self, key: &BlobKey) -> DatabaseResult<u64> {
        let key = key.as_str().to_string();
        self.with_conn(move |conn| {
            let count: i64 = images::table
                .filter(images::blob_key.eq(key))
                .count()
                .get_result(conn)?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
        .await
    }

    #[instrument(skip(self, query), fields(sort_key = %query.sort_key(), include_duplicates = *query.include_duplicates()))]
    async fn list(&self, query: &ListQuery) -> DatabaseResult<SearchResult> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let filter = query.tag_filter().as_ref();

            if !*query.include_duplicates() {
                let rows: Vec<ImageRow> = filtered(filter)
                    .order(images::seq.asc())
                    .select(ImageRow::as_select())
                    .load(conn)?;
                let records = rows
                    .into_iter()
                    .map(|row| row.into_record(Vec::new()))
                    .collect::<DatabaseResult<Vec<_>>>()?;

                let mut result = listing::finish(records, &query);
                let ids: Vec<Uuid> = result.data.iter().map(|r| *r.id.as_uuid()).collect();
                let mut tags = load_tags(conn, &ids)?;
                for record in &mut result.data {
                    record.tags = tags.remove(record.id.as_uuid()).unwrap_or_default();
                }
                return Ok(result);
            }

            let total: i64 = filtered(filter).count().get_result(conn)?;
            let rows: Vec<ImageRow> =
                sorted(filtered(filter), *query.sort_key(), *query.sort_order())
                    .offset(to_sql_window(*query.offset()))
                    .limit(to_sql_window(*query.size()))
                    .select(ImageRow::as_select())
                    .load(conn)?;
            let records = into_records(conn, rows)?;

            Ok(SearchResult::new(
                records,
                u64::try_from(total).unwrap_or_default(),
                &query,
            ))
        })
        .await
    }

    async fn get_or_create_tag(&self, value: &TagValue) -> DatabaseResult<Tag> {
        let value = value.clone();
        self.with_conn(move |conn| {
            let created = diesel::insert_into(tags::table)
                .values(&TagRow {
                    id: Uuid::new_v4(),
                    label: value.label.clone(),
                    color: value.color.clone(),
                })
                .on_conflict((tags::label, tags::color))
                .do_nothing()
                .execute(conn)?;
            if created > 0 {
                debug!(label = %value.label, color = %value.color, "Created tag");
            }

            let row: TagRow = tags::table
                .filter(tags::label.eq(&value.label))
                .filter(tags::color.eq(&value.color))
                .select(TagRow::as_select())
                .first(conn)?;
            Ok(row.into())
        })
        .await
    }

    async fn referenced_blob_keys(&self) -> DatabaseResult<BTreeSet<BlobKey>> {
        self.with_conn(|conn| {
            let keys: Vec<String> = images::table
                .select(images::blob_key)
                .distinct()
                .load(conn)?;
            keys.iter()
                .map(|k| {
                    BlobKey::parse(k).map_err(|e| {
                        DatabaseError::new(DatabaseErrorKind::Serialization(e.to_string()))
                    })
                })
                .collect()
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
