use crate::domain::entities::offline::{
    CacheEntry, QueueFilter, QueueItem, QueueItemDraft, QueueItemPatch,
};
use crate::domain::value_objects::offline::{CacheKey, SyncQueueId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Logical partitions of the local database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Queue,
    Cache,
}

/// ローカル永続化ポート（キューとキャッシュの2区画）
///
/// Every call waits for `initialize` to finish. A missing key is never an
/// error for reads and deletes.
#[async_trait]
pub trait OfflineStore: Send + Sync {
    async fn initialize(&self) -> Result<(), AppError>;
    async fn close(&self);

    async fn insert_queue_item(&self, draft: QueueItemDraft) -> Result<QueueItem, AppError>;
    async fn get_queue_item(&self, id: SyncQueueId) -> Result<Option<QueueItem>, AppError>;
    async fn put_queue_item(&self, item: &QueueItem) -> Result<(), AppError>;
    async fn update_queue_item(
        &self,
        id: SyncQueueId,
        patch: &QueueItemPatch,
    ) -> Result<QueueItem, AppError>;
    async fn delete_queue_item(&self, id: SyncQueueId) -> Result<bool, AppError>;
    async fn list_queue_items(&self, filter: &QueueFilter) -> Result<Vec<QueueItem>, AppError>;
    async fn count_queue_items(&self, filter: &QueueFilter) -> Result<u64, AppError>;
    /// Exhausted rows plus rows at the retry ceiling, including rows that no
    /// longer decode.
    async fn count_needs_attention(&self, max_retries: u32) -> Result<u64, AppError>;

    async fn get_cache_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, AppError>;
    async fn put_cache_entry(&self, entry: &CacheEntry) -> Result<(), AppError>;
    async fn delete_cache_entry(&self, key: &CacheKey) -> Result<bool, AppError>;
    async fn delete_cache_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    async fn clear(&self, partition: Partition) -> Result<(), AppError>;
}
