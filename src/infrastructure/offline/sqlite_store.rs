use super::queries::{
    CLEAR_CACHE, CLEAR_QUEUE, COUNT_NEEDS_ATTENTION, COUNT_QUEUE_ITEMS,
    DELETE_CACHE_ENTRIES_BEFORE, DELETE_CACHE_ENTRY, DELETE_QUEUE_ITEM, INSERT_QUEUE_ITEM,
    PATCH_QUEUE_ITEM, QUARANTINE_QUEUE_ITEM, SELECT_CACHE_ENTRY, SELECT_QUEUE_ITEMS,
    SELECT_QUEUE_ITEM_BY_ID, UPSERT_CACHE_ENTRY, UPSERT_QUEUE_ITEM,
};
use super::rows::{map_cache_entry, map_queue_item};
use crate::application::ports::offline_store::{OfflineStore, Partition};
use crate::domain::entities::offline::{
    CacheEntry, QueueFilter, QueueItem, QueueItemDraft, QueueItemPatch,
};
use crate::domain::value_objects::offline::{CacheKey, SyncQueueId};
use crate::infrastructure::database::{ConnectionPool, is_memory_url};
use crate::shared::config::DatabaseConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

/// SQLite-backed local store holding the sync queue and the read-through cache.
///
/// The handle is created closed; the first `initialize` (or any other call)
/// opens the database and applies the schema. Concurrent callers share that
/// single initialization.
pub struct SqliteOfflineStore {
    database_url: String,
    max_connections: u32,
    connection_timeout: Duration,
    pool: OnceCell<ConnectionPool>,
    ready: OnceCell<()>,
    closed: AtomicBool,
}

impl SqliteOfflineStore {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            database_url: config.url.clone(),
            max_connections: config.max_connections,
            connection_timeout: Duration::from_secs(config.connection_timeout),
            pool: OnceCell::new(),
            ready: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            connection_timeout: 30,
        })
    }

    /// Wraps an already opened pool; the schema is still applied by `initialize`.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            database_url: String::new(),
            max_connections: 1,
            connection_timeout: Duration::from_secs(30),
            pool: OnceCell::new_with(Some(ConnectionPool::from_pool(pool))),
            ready: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    async fn open_pool(&self) -> Result<ConnectionPool, AppError> {
        // データディレクトリがなければ作成する
        if let Some(parent) = database_file(&self.database_url).and_then(|path| path.parent())
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| AppError::StorageUnavailable(err.to_string()))?;
        }

        ConnectionPool::new(
            &self.database_url,
            self.max_connections,
            self.connection_timeout,
        )
        .await
        .map_err(|err| {
            tracing::error!(
                target: "offline::store",
                error = %err,
                "failed to open offline database"
            );
            AppError::StorageUnavailable(err.to_string())
        })
    }

    async fn ensure_ready(&self) -> Result<&SqlitePool, AppError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::StorageUnavailable(
                "Offline store has been closed".to_string(),
            ));
        }
        self.initialize().await?;
        self.pool
            .get()
            .map(ConnectionPool::get_pool)
            .ok_or_else(|| AppError::StorageUnavailable("Offline store is not open".to_string()))
    }
}

/// Parks a row this build cannot decode so the rest of the queue keeps moving.
///
/// The row stays in the table as `exhausted` with the decode error recorded,
/// so it is still counted and can be discarded by id.
async fn quarantine_row(pool: &SqlitePool, row: &SqliteRow, err: &AppError) -> Result<(), AppError> {
    let id: i64 = row.try_get("id")?;
    let reason = err.to_string();
    let result = sqlx::query(QUARANTINE_QUEUE_ITEM)
        .bind(id)
        .bind(&reason)
        .execute(pool)
        .await?;
    if result.rows_affected() > 0 {
        tracing::warn!(
            target: "offline::store",
            id,
            error = %reason,
            "undecodable queue row marked exhausted"
        );
    }
    Ok(())
}

fn database_file(url: &str) -> Option<&Path> {
    if is_memory_url(url) {
        return None;
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty()).then(|| Path::new(path))
}

fn millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

#[async_trait]
impl OfflineStore for SqliteOfflineStore {
    async fn initialize(&self) -> Result<(), AppError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::StorageUnavailable(
                "Offline store has been closed".to_string(),
            ));
        }
        self.ready
            .get_or_try_init(|| async {
                let pool = self.pool.get_or_try_init(|| self.open_pool()).await?;
                pool.migrate().await?;
                tracing::debug!(target: "offline::store", "offline store initialized");
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
        tracing::debug!(target: "offline::store", "offline store closed");
    }

    async fn insert_queue_item(&self, draft: QueueItemDraft) -> Result<QueueItem, AppError> {
        let pool = self.ensure_ready().await?;
        let payload = serde_json::to_string(draft.payload.as_json())?;
        let row = sqlx::query(INSERT_QUEUE_ITEM)
            .bind(draft.entity_kind.as_str())
            .bind(draft.action.as_str())
            .bind(payload)
            .bind(millis(draft.created_at))
            .fetch_one(pool)
            .await?;
        map_queue_item(&row)
    }

    async fn get_queue_item(&self, id: SyncQueueId) -> Result<Option<QueueItem>, AppError> {
        let pool = self.ensure_ready().await?;
        let row = sqlx::query(SELECT_QUEUE_ITEM_BY_ID)
            .bind(id.value())
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => map_queue_item(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn put_queue_item(&self, item: &QueueItem) -> Result<(), AppError> {
        let pool = self.ensure_ready().await?;
        let payload = serde_json::to_string(item.payload.as_json())?;
        sqlx::query(UPSERT_QUEUE_ITEM)
            .bind(item.id.value())
            .bind(item.entity_kind.as_str())
            .bind(item.action.as_str())
            .bind(payload)
            .bind(item.status.as_str())
            .bind(i64::from(item.retry_count))
            .bind(millis(item.created_at))
            .bind(item.last_retry_at.map(millis))
            .bind(&item.last_error)
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn update_queue_item(
        &self,
        id: SyncQueueId,
        patch: &QueueItemPatch,
    ) -> Result<QueueItem, AppError> {
        let pool = self.ensure_ready().await?;
        let row = sqlx::query(PATCH_QUEUE_ITEM)
            .bind(id.value())
            .bind(patch.status.map(|status| status.as_str()))
            .bind(patch.retry_count.map(i64::from))
            .bind(patch.last_retry_at.is_some())
            .bind(patch.last_retry_at.flatten().map(millis))
            .bind(patch.last_error.is_some())
            .bind(patch.last_error.clone().flatten())
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => map_queue_item(&row),
            None => Err(AppError::ItemNotFound(id.to_string())),
        }
    }

    async fn delete_queue_item(&self, id: SyncQueueId) -> Result<bool, AppError> {
        let pool = self.ensure_ready().await?;
        let result = sqlx::query(DELETE_QUEUE_ITEM)
            .bind(id.value())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_queue_items(&self, filter: &QueueFilter) -> Result<Vec<QueueItem>, AppError> {
        let pool = self.ensure_ready().await?;
        let rows = sqlx::query(SELECT_QUEUE_ITEMS)
            .bind(filter.entity_kind.map(|kind| kind.as_str()))
            .bind(filter.status.map(|status| status.as_str()))
            .fetch_all(pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            match map_queue_item(row) {
                Ok(item) => items.push(item),
                Err(err) => quarantine_row(pool, row, &err).await?,
            }
        }
        Ok(items)
    }

    async fn count_queue_items(&self, filter: &QueueFilter) -> Result<u64, AppError> {
        let pool = self.ensure_ready().await?;
        let row = sqlx::query(COUNT_QUEUE_ITEMS)
            .bind(filter.entity_kind.map(|kind| kind.as_str()))
            .bind(filter.status.map(|status| status.as_str()))
            .fetch_one(pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn count_needs_attention(&self, max_retries: u32) -> Result<u64, AppError> {
        let pool = self.ensure_ready().await?;
        let row = sqlx::query(COUNT_NEEDS_ATTENTION)
            .bind(i64::from(max_retries))
            .fetch_one(pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn get_cache_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, AppError> {
        let pool = self.ensure_ready().await?;
        let row = sqlx::query(SELECT_CACHE_ENTRY)
            .bind(key.as_str())
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => map_cache_entry(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn put_cache_entry(&self, entry: &CacheEntry) -> Result<(), AppError> {
        let pool = self.ensure_ready().await?;
        let value = serde_json::to_string(&entry.value)?;
        sqlx::query(UPSERT_CACHE_ENTRY)
            .bind(entry.key.as_str())
            .bind(value)
            .bind(millis(entry.updated_at))
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn delete_cache_entry(&self, key: &CacheKey) -> Result<bool, AppError> {
        let pool = self.ensure_ready().await?;
        let result = sqlx::query(DELETE_CACHE_ENTRY)
            .bind(key.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_cache_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let pool = self.ensure_ready().await?;
        let result = sqlx::query(DELETE_CACHE_ENTRIES_BEFORE)
            .bind(millis(cutoff))
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear(&self, partition: Partition) -> Result<(), AppError> {
        let pool = self.ensure_ready().await?;
        let statement = match partition {
            Partition::Queue => CLEAR_QUEUE,
            Partition::Cache => CLEAR_CACHE,
        };
        sqlx::query(statement).execute(pool).await?;
        Ok(())
    }
}
