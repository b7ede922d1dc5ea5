//! Persistence for media records.
//!
//! [`MediaStore`] is the table interface the catalog talks to. Two backends
//! exist: [`SqliteMediaStore`] keeps the `media_items` table in SQLite, and
//! [`MemoryMediaStore`] holds records in process, seeded with the built-in
//! demo set. [`open_store`] picks one at startup from the configured URL.

use crate::models::media::{MediaKind, MediaPatch, MediaRecord, MediaStatus};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{
    QueryBuilder, SqlitePool,
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const MEDIA_COLUMNS: &str = "id, name, kind, category, description, upload_date, status, \
     account_id, remote_file_id, url, thumbnail_url, mime_type, size_bytes";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence backend unavailable: {0}")]
    Unavailable(String),
    #[error("record `{0}` already exists")]
    Duplicate(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Table operations over `media_items`.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Short backend label for logs and readiness output.
    fn backend_name(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    /// Every record, newest `upload_date` first.
    async fn list_all(&self) -> StoreResult<Vec<MediaRecord>>;

    async fn get(&self, id: &str) -> StoreResult<Option<MediaRecord>>;

    async fn list_by_category(&self, category: &str) -> StoreResult<Vec<MediaRecord>>;

    async fn list_by_kind(&self, kind: MediaKind) -> StoreResult<Vec<MediaRecord>>;

    async fn insert(&self, record: &MediaRecord) -> StoreResult<MediaRecord>;

    /// Apply `patch` to the record and return it, or `None` for unknown ids.
    async fn update(&self, id: &str, patch: &MediaPatch) -> StoreResult<Option<MediaRecord>>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> StoreResult<bool>;
}

/// The demo records the site ships with.
pub fn builtin_records() -> Vec<MediaRecord> {
    #[allow(clippy::too_many_arguments)]
    fn record(
        id: &str,
        name: &str,
        kind: MediaKind,
        category: &str,
        description: &str,
        (y, m, d): (i32, u32, u32),
        status: MediaStatus,
        account_id: &str,
        file_id: &str,
        mime_type: &str,
        size_bytes: i64,
    ) -> MediaRecord {
        MediaRecord {
            id: id.into(),
            name: name.into(),
            kind,
            category: category.into(),
            description: description.into(),
            upload_date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            status,
            account_id: account_id.into(),
            remote_file_id: file_id.into(),
            url: MediaRecord::view_url(file_id),
            thumbnail_url: MediaRecord::thumbnail_url_for(file_id),
            mime_type: mime_type.into(),
            size_bytes,
        }
    }

    vec![
        record(
            "media1",
            "Engagement Photo 1",
            MediaKind::Image,
            "Engagement",
            "Beautiful moment from engagement ceremony",
            (2025, 10, 1),
            MediaStatus::Published,
            "drive1",
            "file-12345",
            "image/jpeg",
            2_048_576,
        ),
        record(
            "media2",
            "Engagement Photo 2",
            MediaKind::Image,
            "Engagement",
            "Couple portrait",
            (2025, 10, 1),
            MediaStatus::Published,
            "drive1",
            "file-12346",
            "image/png",
            3_048_576,
        ),
        record(
            "media3",
            "Pre-Wedding Video",
            MediaKind::Video,
            "Pre-Wedding",
            "Pre-wedding video shoot",
            (2025, 10, 5),
            MediaStatus::Draft,
            "drive2",
            "file-12347",
            "video/mp4",
            50_485_760,
        ),
    ]
}

/// Sort newest first, keeping insertion order between equal dates.
pub fn sort_newest_first(records: &mut [MediaRecord]) {
    records.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
}

/// In-process record list.
#[derive(Debug, Default)]
pub struct MemoryMediaStore {
    records: RwLock<Vec<MediaRecord>>,
}

impl MemoryMediaStore {
    pub fn new(records: Vec<MediaRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn seeded() -> Self {
        Self::new(builtin_records())
    }

    async fn filtered<F>(&self, keep: F) -> Vec<MediaRecord>
    where
        F: Fn(&MediaRecord) -> bool,
    {
        let mut records: Vec<MediaRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| keep(r))
            .cloned()
            .collect();
        sort_newest_first(&mut records);
        records
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn list_all(&self) -> StoreResult<Vec<MediaRecord>> {
        Ok(self.filtered(|_| true).await)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<MediaRecord>> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn list_by_category(&self, category: &str) -> StoreResult<Vec<MediaRecord>> {
        Ok(self.filtered(|r| r.category == category).await)
    }

    async fn list_by_kind(&self, kind: MediaKind) -> StoreResult<Vec<MediaRecord>> {
        Ok(self.filtered(|r| r.kind == kind).await)
    }

    async fn insert(&self, record: &MediaRecord) -> StoreResult<MediaRecord> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Duplicate(record.id.clone()));
        }
        records.push(record.clone());
        Ok(record.clone())
    }

    async fn update(&self, id: &str, patch: &MediaPatch) -> StoreResult<Option<MediaRecord>> {
        let mut records = self.records.write().await;
        Ok(records.iter_mut().find(|r| r.id == id).map(|record| {
            record.apply(patch);
            record.clone()
        }))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }
}

/// `media_items` stored in SQLite.
#[derive(Clone)]
pub struct SqliteMediaStore {
    pub db: Arc<SqlitePool>,
}

impl SqliteMediaStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Open a pool for `url`, creating the database file if needed.
    ///
    /// In-memory databases are pinned to a single long-lived connection,
    /// since every SQLite connection would otherwise see its own empty
    /// database.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Run the embedded schema statements. Safe to repeat.
    pub async fn migrate(&self) -> StoreResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        info!("Running {} migration statements...", statements.len());
        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    async fn select_where(
        &self,
        column: &'static str,
        value: String,
    ) -> StoreResult<Vec<MediaRecord>> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {MEDIA_COLUMNS} FROM media_items"));
        builder.push(format!(" WHERE {column} = "));
        builder.push_bind(value);
        builder.push(" ORDER BY upload_date DESC, rowid ASC");
        Ok(builder.build_query_as().fetch_all(&*self.db).await?)
    }
}

#[async_trait]
impl MediaStore for SqliteMediaStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> StoreResult<()> {
        match sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?
        {
            1 => Ok(()),
            other => Err(StoreError::Unavailable(format!(
                "unexpected result: {}",
                other
            ))),
        }
    }

    async fn list_all(&self) -> StoreResult<Vec<MediaRecord>> {
        let rows = sqlx::query_as::<_, MediaRecord>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media_items ORDER BY upload_date DESC, rowid ASC"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<MediaRecord>> {
        let row = sqlx::query_as::<_, MediaRecord>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media_items WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    async fn list_by_category(&self, category: &str) -> StoreResult<Vec<MediaRecord>> {
        self.select_where("category", category.to_string()).await
    }

    async fn list_by_kind(&self, kind: MediaKind) -> StoreResult<Vec<MediaRecord>> {
        self.select_where("kind", kind.as_str().to_string()).await
    }

    async fn insert(&self, record: &MediaRecord) -> StoreResult<MediaRecord> {
        let inserted = sqlx::query_as::<_, MediaRecord>(&format!(
            "INSERT INTO media_items ({MEDIA_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(&record.id)
        .bind(&record.name)
        .bind(record.kind)
        .bind(&record.category)
        .bind(&record.description)
        .bind(record.upload_date)
        .bind(record.status)
        .bind(&record.account_id)
        .bind(&record.remote_file_id)
        .bind(&record.url)
        .bind(&record.thumbnail_url)
        .bind(&record.mime_type)
        .bind(record.size_bytes)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::Duplicate(record.id.clone())
            } else {
                StoreError::Sqlx(err)
            }
        })?;
        Ok(inserted)
    }

    /// Single `UPDATE` touching only the patched columns.
    async fn update(&self, id: &str, patch: &MediaPatch) -> StoreResult<Option<MediaRecord>> {
        if patch.is_empty() {
            return self.get(id).await;
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE media_items SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(name) = &patch.name {
                set.push("name = ").push_bind_unseparated(name.clone());
            }
            if let Some(kind) = patch.kind {
                set.push("kind = ").push_bind_unseparated(kind);
            }
            if let Some(category) = &patch.category {
                set.push("category = ").push_bind_unseparated(category.clone());
            }
            if let Some(description) = &patch.description {
                set.push("description = ")
                    .push_bind_unseparated(description.clone());
            }
            if let Some(upload_date) = patch.upload_date {
                set.push("upload_date = ").push_bind_unseparated(upload_date);
            }
            if let Some(status) = patch.status {
                set.push("status = ").push_bind_unseparated(status);
            }
            if let Some(account_id) = &patch.account_id {
                set.push("account_id = ")
                    .push_bind_unseparated(account_id.clone());
            }
            if let Some(remote_file_id) = &patch.remote_file_id {
                set.push("remote_file_id = ")
                    .push_bind_unseparated(remote_file_id.clone());
            }
            if let Some(url) = &patch.url {
                set.push("url = ").push_bind_unseparated(url.clone());
            }
            if let Some(thumbnail_url) = &patch.thumbnail_url {
                set.push("thumbnail_url = ")
                    .push_bind_unseparated(thumbnail_url.clone());
            }
            if let Some(mime_type) = &patch.mime_type {
                set.push("mime_type = ")
                    .push_bind_unseparated(mime_type.clone());
            }
            if let Some(size_bytes) = patch.size_bytes {
                set.push("size_bytes = ").push_bind_unseparated(size_bytes);
            }
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id.to_string());
        builder.push(format!(" RETURNING {MEDIA_COLUMNS}"));

        Ok(builder.build_query_as().fetch_optional(&*self.db).await?)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM media_items WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// Pick the persistence backend for this process.
///
/// A usable `sqlite:` URL gives a [`SqliteMediaStore`] with its schema in
/// place. A missing, blank or unsupported URL, or a database that cannot be
/// opened, falls back to the seeded [`MemoryMediaStore`].
pub async fn open_store(database_url: Option<&str>) -> Arc<dyn MediaStore> {
    let Some(url) = database_url.map(str::trim).filter(|u| !u.is_empty()) else {
        warn!("No database URL configured. Using built-in media records.");
        return Arc::new(MemoryMediaStore::seeded());
    };

    if !url.starts_with("sqlite:") {
        warn!(url, "Unsupported database URL. Using built-in media records.");
        return Arc::new(MemoryMediaStore::seeded());
    }

    let store = match SqliteMediaStore::connect(url).await {
        Ok(store) => store,
        Err(err) => {
            warn!(url, error = %err, "Could not open database. Using built-in media records.");
            return Arc::new(MemoryMediaStore::seeded());
        }
    };

    if let Err(err) = store.migrate().await {
        warn!(url, error = %err, "Could not prepare media_items. Using built-in media records.");
        return Arc::new(MemoryMediaStore::seeded());
    }

    info!(url, "Using SQLite media store");
    Arc::new(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn sqlite() -> SqliteMediaStore {
        let store = SqliteMediaStore::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn sample(id: &str, category: &str, date: (i32, u32, u32)) -> MediaRecord {
        MediaRecord {
            id: id.into(),
            category: category.into(),
            upload_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            ..builtin_records().remove(0)
        }
    }

    #[tokio::test]
    async fn memory_store_lists_newest_first() {
        let store = MemoryMediaStore::seeded();
        let ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["media3", "media1", "media2"]);
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_ids() {
        let store = MemoryMediaStore::seeded();
        let dup = builtin_records().remove(0);
        assert!(matches!(
            store.insert(&dup).await,
            Err(StoreError::Duplicate(id)) if id == "media1"
        ));
    }

    #[tokio::test]
    async fn memory_store_update_and_delete() {
        let store = MemoryMediaStore::seeded();

        let updated = store
            .update("media3", &MediaPatch::status(MediaStatus::Published))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, MediaStatus::Published);
        assert!(store.update("nope", &MediaPatch::default()).await.unwrap().is_none());

        assert!(store.delete("media3").await.unwrap());
        assert!(!store.delete("media3").await.unwrap());
        assert!(store.get("media3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_store_round_trips_records() {
        let store = sqlite().await;
        for record in builtin_records() {
            store.insert(&record).await.unwrap();
        }

        let fetched = store.get("media3").await.unwrap().unwrap();
        assert_eq!(fetched, builtin_records()[2]);

        let ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["media3", "media1", "media2"]);
    }

    #[tokio::test]
    async fn sqlite_store_filters_by_category_and_kind() {
        let store = sqlite().await;
        for record in builtin_records() {
            store.insert(&record).await.unwrap();
        }
        store
            .insert(&sample("media4", "Ceremony", (2025, 11, 2)))
            .await
            .unwrap();

        let engagement = store.list_by_category("Engagement").await.unwrap();
        assert_eq!(engagement.len(), 2);

        let videos = store.list_by_kind(MediaKind::Video).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, "media3");

        let images = store.list_by_kind(MediaKind::Image).await.unwrap();
        assert_eq!(images[0].id, "media4");
    }

    #[tokio::test]
    async fn sqlite_store_partial_update_keeps_other_columns() {
        let store = sqlite().await;
        let original = builtin_records().remove(2);
        store.insert(&original).await.unwrap();

        let patch = MediaPatch {
            status: Some(MediaStatus::Published),
            description: Some("Edited".into()),
            ..MediaPatch::default()
        };
        let updated = store.update("media3", &patch).await.unwrap().unwrap();

        let mut expected = original.clone();
        expected.apply(&patch);
        assert_eq!(updated, expected);
        assert!(store.update("missing", &patch).await.unwrap().is_none());
        assert_eq!(
            store.update("media3", &MediaPatch::default()).await.unwrap(),
            Some(expected)
        );
    }

    #[tokio::test]
    async fn sqlite_store_delete_and_duplicates() {
        let store = sqlite().await;
        let record = builtin_records().remove(0);
        store.insert(&record).await.unwrap();

        assert!(matches!(
            store.insert(&record).await,
            Err(StoreError::Duplicate(_))
        ));
        assert!(store.delete("media1").await.unwrap());
        assert!(!store.delete("media1").await.unwrap());
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn open_store_falls_back_to_memory() {
        assert_eq!(open_store(None).await.backend_name(), "memory");
        assert_eq!(open_store(Some("  ")).await.backend_name(), "memory");
        assert_eq!(
            open_store(Some("postgres://localhost/wedding_db"))
                .await
                .backend_name(),
            "memory"
        );
        assert_eq!(
            open_store(Some("sqlite::memory:")).await.backend_name(),
            "sqlite"
        );
    }
}
