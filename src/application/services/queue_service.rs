use crate::application::ports::clock::Clock;
use crate::application::ports::offline_store::OfflineStore;
use crate::domain::entities::offline::{QueueFilter, QueueItem, QueueItemDraft, QueueItemPatch};
use crate::domain::value_objects::offline::{EntityKind, QueueAction, QueuePayload, SyncQueueId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

#[async_trait]
pub trait QueueServiceTrait: Send + Sync {
    async fn enqueue(
        &self,
        entity_kind: EntityKind,
        action: QueueAction,
        payload: QueuePayload,
    ) -> Result<SyncQueueId, AppError>;
    async fn list_queue(&self, entity_kind: Option<EntityKind>)
    -> Result<Vec<QueueItem>, AppError>;
    async fn get_item(&self, id: SyncQueueId) -> Result<Option<QueueItem>, AppError>;
    async fn update_item(
        &self,
        id: SyncQueueId,
        patch: QueueItemPatch,
    ) -> Result<QueueItem, AppError>;
    async fn remove_item(&self, id: SyncQueueId) -> Result<(), AppError>;
    async fn count(&self, entity_kind: Option<EntityKind>) -> Result<u64, AppError>;
    async fn list_needs_attention(&self) -> Result<Vec<QueueItem>, AppError>;
    async fn count_needs_attention(&self) -> Result<u64, AppError>;
    async fn requeue(&self, id: SyncQueueId) -> Result<QueueItem, AppError>;
    async fn discard(&self, id: SyncQueueId) -> Result<bool, AppError>;
    fn subscribe_pending_count(&self) -> watch::Receiver<u64>;
}

/// 同期キューの管理（追加・一覧・更新・削除）
pub struct QueueService {
    store: Arc<dyn OfflineStore>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
    pending_count: watch::Sender<u64>,
}

impl QueueService {
    pub fn new(store: Arc<dyn OfflineStore>, clock: Arc<dyn Clock>, max_retries: u32) -> Self {
        let (pending_count, _) = watch::channel(0);
        Self {
            store,
            clock,
            max_retries,
            pending_count,
        }
    }

    /// Re-reads the queue size and publishes it if it changed.
    pub async fn refresh_pending_count(&self) -> Result<u64, AppError> {
        let count = self.store.count_queue_items(&QueueFilter::all()).await?;
        self.pending_count.send_if_modified(|current| {
            if *current == count {
                false
            } else {
                *current = count;
                true
            }
        });
        Ok(count)
    }

    async fn publish_count(&self) {
        if let Err(err) = self.refresh_pending_count().await {
            tracing::warn!(
                target: "offline::queue",
                error = %err,
                "failed to refresh pending count"
            );
        }
    }
}

#[async_trait]
impl QueueServiceTrait for QueueService {
    async fn enqueue(
        &self,
        entity_kind: EntityKind,
        action: QueueAction,
        payload: QueuePayload,
    ) -> Result<SyncQueueId, AppError> {
        let draft = QueueItemDraft::new(entity_kind, action, payload, self.clock.now());
        let item = self.store.insert_queue_item(draft).await?;
        tracing::debug!(
            target: "offline::queue",
            id = %item.id,
            entity_kind = %entity_kind,
            action = %action,
            "queued offline mutation"
        );
        self.publish_count().await;
        Ok(item.id)
    }

    async fn list_queue(
        &self,
        entity_kind: Option<EntityKind>,
    ) -> Result<Vec<QueueItem>, AppError> {
        let mut items = self
            .store
            .list_queue_items(&QueueFilter::for_kind(entity_kind))
            .await?;
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn get_item(&self, id: SyncQueueId) -> Result<Option<QueueItem>, AppError> {
        self.store.get_queue_item(id).await
    }

    async fn update_item(
        &self,
        id: SyncQueueId,
        patch: QueueItemPatch,
    ) -> Result<QueueItem, AppError> {
        self.store.update_queue_item(id, &patch).await
    }

    async fn remove_item(&self, id: SyncQueueId) -> Result<(), AppError> {
        let removed = self.store.delete_queue_item(id).await?;
        if removed {
            self.publish_count().await;
        }
        Ok(())
    }

    async fn count(&self, entity_kind: Option<EntityKind>) -> Result<u64, AppError> {
        self.store
            .count_queue_items(&QueueFilter::for_kind(entity_kind))
            .await
    }

    async fn list_needs_attention(&self) -> Result<Vec<QueueItem>, AppError> {
        let items = self.list_queue(None).await?;
        Ok(items
            .into_iter()
            .filter(|item| item.is_exhausted(self.max_retries))
            .collect())
    }

    async fn count_needs_attention(&self) -> Result<u64, AppError> {
        self.store.count_needs_attention(self.max_retries).await
    }

    async fn requeue(&self, id: SyncQueueId) -> Result<QueueItem, AppError> {
        let item = self
            .store
            .update_queue_item(id, &QueueItemPatch::reset())
            .await?;
        tracing::info!(
            target: "offline::queue",
            id = %id,
            entity_kind = %item.entity_kind,
            "queue item requeued by operator"
        );
        Ok(item)
    }

    async fn discard(&self, id: SyncQueueId) -> Result<bool, AppError> {
        let removed = self.store.delete_queue_item(id).await?;
        if removed {
            tracing::warn!(
                target: "offline::queue",
                id = %id,
                "queue item discarded by operator"
            );
            self.publish_count().await;
        }
        Ok(removed)
    }

    fn subscribe_pending_count(&self) -> watch::Receiver<u64> {
        self.pending_count.subscribe()
    }
}
