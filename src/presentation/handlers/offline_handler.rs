use crate::application::ports::connectivity::ConnectivitySource;
use crate::application::services::sync::{OfflineSyncMetricsSnapshot, PassTrigger, SyncEngine};
use crate::application::services::{CacheService, QueueServiceTrait};
use crate::domain::value_objects::offline::{EntityKind, QueueAction, QueuePayload, SyncQueueId};
use crate::presentation::dto::offline::{
    EnqueueRequest, EnqueueResponse, ListQueueRequest, PendingStatusResponse, QueueItemResponse,
    SyncReportResponse,
};
use crate::presentation::dto::{ApiResponse, Validate};
use crate::shared::AppError;
use crate::state::OfflineRuntime;
use std::sync::Arc;

pub struct OfflineHandler {
    queue: Arc<dyn QueueServiceTrait>,
    engine: Arc<SyncEngine>,
    cache: Arc<CacheService>,
    connectivity: Arc<dyn ConnectivitySource>,
}

impl OfflineHandler {
    pub fn new(
        queue: Arc<dyn QueueServiceTrait>,
        engine: Arc<SyncEngine>,
        cache: Arc<CacheService>,
        connectivity: Arc<dyn ConnectivitySource>,
    ) -> Self {
        Self {
            queue,
            engine,
            cache,
            connectivity,
        }
    }

    pub fn from_runtime(runtime: &OfflineRuntime) -> Self {
        Self::new(
            runtime.queue.clone(),
            Arc::clone(&runtime.engine),
            Arc::clone(&runtime.cache),
            Arc::clone(&runtime.connectivity),
        )
    }

    pub async fn enqueue(&self, request: EnqueueRequest) -> ApiResponse<EnqueueResponse> {
        ApiResponse::from_result(self.enqueue_inner(request).await)
    }

    async fn enqueue_inner(&self, request: EnqueueRequest) -> Result<EnqueueResponse, AppError> {
        request.validate().map_err(AppError::ValidationError)?;

        let entity_kind = parse_entity_kind(&request.entity_kind)?;
        let action = QueueAction::from_value(&request.action).map_err(AppError::ValidationError)?;
        let payload = QueuePayload::new(request.payload).map_err(AppError::ValidationError)?;

        let id = self.queue.enqueue(entity_kind, action, payload).await?;
        let pending_count = self.queue.count(None).await?;

        // オンラインなら即座に同期を試みる
        if self.connectivity.is_online() {
            self.engine.trigger(PassTrigger::Manual);
        }

        Ok(EnqueueResponse {
            id: id.value(),
            pending_count,
        })
    }

    pub async fn list_queue(&self, request: ListQueueRequest) -> ApiResponse<Vec<QueueItemResponse>> {
        ApiResponse::from_result(self.list_queue_inner(request).await)
    }

    async fn list_queue_inner(
        &self,
        request: ListQueueRequest,
    ) -> Result<Vec<QueueItemResponse>, AppError> {
        let kind = request
            .entity_kind
            .as_deref()
            .map(parse_entity_kind)
            .transpose()?;

        let items = if request.needs_attention_only {
            self.queue
                .list_needs_attention()
                .await?
                .into_iter()
                .filter(|item| kind.is_none_or(|kind| item.entity_kind == kind))
                .collect()
        } else {
            self.queue.list_queue(kind).await?
        };
        Ok(items.into_iter().map(QueueItemResponse::from).collect())
    }

    pub async fn pending_status(&self) -> ApiResponse<PendingStatusResponse> {
        ApiResponse::from_result(self.pending_status_inner().await)
    }

    async fn pending_status_inner(&self) -> Result<PendingStatusResponse, AppError> {
        let pending_count = self.queue.count(None).await?;
        let needs_attention_count = self.queue.count_needs_attention().await?;
        let metrics = self.engine.metrics();

        Ok(PendingStatusResponse {
            pending_count,
            needs_attention_count,
            is_online: self.connectivity.is_online(),
            is_syncing: self.engine.is_running(),
            last_sync_at: metrics.last_finished_at.map(|at| at.timestamp_millis()),
            last_remaining: metrics.last_remaining,
        })
    }

    pub async fn sync_now(&self) -> ApiResponse<SyncReportResponse> {
        ApiResponse::from_result(
            self.engine
                .sync_now()
                .await
                .map(SyncReportResponse::from),
        )
    }

    pub async fn requeue(&self, id: i64) -> ApiResponse<QueueItemResponse> {
        let result = match parse_queue_id(id) {
            Ok(id) => self.queue.requeue(id).await.map(QueueItemResponse::from),
            Err(err) => Err(err),
        };
        ApiResponse::from_result(result)
    }

    pub async fn discard(&self, id: i64) -> ApiResponse<bool> {
        let result = match parse_queue_id(id) {
            Ok(id) => self.queue.discard(id).await,
            Err(err) => Err(err),
        };
        ApiResponse::from_result(result)
    }

    pub fn sync_metrics(&self) -> ApiResponse<OfflineSyncMetricsSnapshot> {
        ApiResponse::success(self.engine.metrics())
    }

    pub async fn clear_cache(&self) -> ApiResponse<()> {
        self.cache.clear().await;
        ApiResponse::success(())
    }
}

fn parse_entity_kind(value: &str) -> Result<EntityKind, AppError> {
    EntityKind::from_value(value).map_err(AppError::ValidationError)
}

fn parse_queue_id(value: i64) -> Result<SyncQueueId, AppError> {
    SyncQueueId::new(value).map_err(AppError::ValidationError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::offline_store::OfflineStore;
    use crate::application::services::QueueService;
    use crate::application::services::sync::mocks::MockBackend;
    use crate::application::services::sync::{
        HandlerRegistry, RemoteEntityHandler, SyncEngineConfig,
    };
    use crate::domain::entities::offline::QueueItemPatch;
    use crate::domain::value_objects::offline::QueueItemStatus;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::connectivity::NetworkMonitor;
    use crate::infrastructure::offline::SqliteOfflineStore;
    use serde_json::json;

    struct Fixture {
        handler: OfflineHandler,
        queue: Arc<QueueService>,
        backend: Arc<MockBackend>,
    }

    async fn fixture(online: bool) -> Fixture {
        let store: Arc<dyn OfflineStore> = Arc::new(SqliteOfflineStore::in_memory());
        store.initialize().await.unwrap();
        let queue = Arc::new(QueueService::new(store.clone(), Arc::new(SystemClock), 5));
        let backend = Arc::new(MockBackend::default());
        let registry = HandlerRegistry::builder()
            .register_all(
                EntityKind::ALL,
                Arc::new(RemoteEntityHandler::new(backend.clone())),
            )
            .build();
        let monitor = Arc::new(NetworkMonitor::new(online));
        let engine = Arc::new(SyncEngine::new(
            queue.clone(),
            Arc::new(registry),
            monitor.clone(),
            Arc::new(SystemClock),
            SyncEngineConfig::default(),
        ));
        let cache = Arc::new(CacheService::new(store, Arc::new(SystemClock), None));
        Fixture {
            handler: OfflineHandler::new(queue.clone(), engine, cache, monitor),
            queue,
            backend,
        }
    }

    #[tokio::test]
    async fn enqueue_rejects_invalid_requests_with_validation_code() {
        let fx = fixture(false).await;
        let response = fx
            .handler
            .enqueue(EnqueueRequest {
                entity_kind: "spaceships".into(),
                action: "create".into(),
                payload: json!({"name": "x"}),
            })
            .await;
        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some("VALIDATION_ERROR"));
        assert_eq!(response.retryable, Some(false));
        assert_eq!(fx.queue.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn offline_enqueue_then_manual_sync() {
        let fx = fixture(false).await;
        let response = fx
            .handler
            .enqueue(EnqueueRequest {
                entity_kind: "transactions".into(),
                action: "create".into(),
                payload: json!({"amount": 2500, "product": "igname"}),
            })
            .await;
        let created = response.data.unwrap();
        assert_eq!(created.pending_count, 1);

        let status = fx.handler.pending_status().await.data.unwrap();
        assert_eq!(status.pending_count, 1);
        assert!(!status.is_online);
        assert!(status.last_sync_at.is_none());

        let report = fx.handler.sync_now().await.data.unwrap();
        assert!(report.was_offline);
        assert_eq!(fx.backend.write_count(), 0);

        let listed = fx
            .handler
            .list_queue(ListQueueRequest::default())
            .await
            .data
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].status, "pending");
    }

    #[tokio::test]
    async fn needs_attention_requeue_and_discard() {
        let fx = fixture(false).await;
        let created = fx
            .handler
            .enqueue(EnqueueRequest {
                entity_kind: "invoices".into(),
                action: "create".into(),
                payload: json!({"total": 10}),
            })
            .await
            .data
            .unwrap();
        let id = SyncQueueId::new(created.id).unwrap();
        fx.queue
            .update_item(
                id,
                QueueItemPatch {
                    status: Some(QueueItemStatus::Exhausted),
                    retry_count: Some(5),
                    ..QueueItemPatch::default()
                },
            )
            .await
            .unwrap();

        let attention = fx
            .handler
            .list_queue(ListQueueRequest {
                entity_kind: Some("invoices".into()),
                needs_attention_only: true,
            })
            .await
            .data
            .unwrap();
        assert_eq!(attention.len(), 1);

        let requeued = fx.handler.requeue(created.id).await.data.unwrap();
        assert_eq!(requeued.retry_count, 0);
        assert_eq!(requeued.status, "pending");

        assert_eq!(fx.handler.discard(created.id).await.data, Some(true));
        assert_eq!(fx.handler.discard(created.id).await.data, Some(false));

        let missing = fx.handler.requeue(created.id).await;
        assert_eq!(missing.error_code.as_deref(), Some("ITEM_NOT_FOUND"));
    }

    #[tokio::test]
    async fn online_sync_now_reports_counts() {
        let fx = fixture(true).await;
        fx.queue
            .enqueue(
                EntityKind::Transactions,
                QueueAction::Create,
                QueuePayload::new(json!({"amount": 100})).unwrap(),
            )
            .await
            .unwrap();

        let report = fx.handler.sync_now().await.data.unwrap();
        assert!(!report.already_running);
        assert_eq!(report.synced_count, 1);
        assert_eq!(report.remaining_count, 0);

        let metrics = fx.handler.sync_metrics().data.unwrap();
        assert_eq!(metrics.total_synced, 1);
        assert!(fx.handler.clear_cache().await.success);
    }
}
