use crate::application::ports::clock::Clock;
use crate::application::ports::connectivity::ConnectivitySource;
use crate::application::ports::offline_store::OfflineStore;
use crate::application::ports::remote_backend::{ObjectStorage, RemoteWriteApi};
use crate::application::services::sync::{
    HandlerRegistry, MerchantHandler, PassTrigger, RemoteEntityHandler, SyncEngine,
    SyncEngineConfig,
};
use crate::application::services::{
    CacheService, ConnectivityWatcher, PhotoUploader, QueueService,
};
use crate::domain::value_objects::offline::EntityKind;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::offline::SqliteOfflineStore;
use crate::infrastructure::remote::RestBackendClient;
use crate::shared::config::{AppConfig, BackendConfig, MerchantConfig};
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;

/// Remote collaborators the runtime syncs against.
#[derive(Clone)]
pub struct RemoteBackend {
    pub api: Arc<dyn RemoteWriteApi>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl RemoteBackend {
    pub fn rest(config: &BackendConfig) -> Result<Self, AppError> {
        let client = Arc::new(RestBackendClient::new(config)?);
        Ok(Self {
            api: client.clone(),
            storage: client,
        })
    }
}

/// オフライン同期サブシステム全体の状態
///
/// Owns the store handle; nothing in the crate keeps a global connection.
pub struct OfflineRuntime {
    pub config: AppConfig,
    pub store: Arc<dyn OfflineStore>,
    pub queue: Arc<QueueService>,
    pub photos: Arc<PhotoUploader>,
    pub engine: Arc<SyncEngine>,
    pub cache: Arc<CacheService>,
    pub connectivity: Arc<dyn ConnectivitySource>,
    watcher: ConnectivityWatcher,
}

impl OfflineRuntime {
    pub async fn open(
        config: AppConfig,
        backend: RemoteBackend,
        connectivity: Arc<dyn ConnectivitySource>,
    ) -> Result<Self, AppError> {
        Self::open_with_clock(config, backend, connectivity, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        config: AppConfig,
        backend: RemoteBackend,
        connectivity: Arc<dyn ConnectivitySource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        config.validate().map_err(AppError::ConfigurationError)?;

        let store: Arc<dyn OfflineStore> = Arc::new(SqliteOfflineStore::new(&config.database));
        store.initialize().await?;

        let queue = Arc::new(QueueService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.sync.max_retries,
        ));
        queue.refresh_pending_count().await?;

        let photos = Arc::new(PhotoUploader::new(
            Arc::clone(&backend.storage),
            config.photos.clone(),
        ));
        let handlers = build_handlers(&backend, Arc::clone(&photos), &config.merchants)?;

        let engine = Arc::new(SyncEngine::new(
            queue.clone(),
            Arc::new(handlers),
            Arc::clone(&connectivity),
            Arc::clone(&clock),
            SyncEngineConfig::from(&config.sync),
        ));

        let cache = Arc::new(CacheService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.cache.ttl_secs.map(Duration::from_secs),
        ));
        cache.purge_expired().await;

        let watcher = ConnectivityWatcher::spawn(
            Arc::clone(&connectivity),
            Arc::clone(&engine),
            Duration::from_millis(config.connectivity.settle_delay_ms),
        );

        if config.sync.auto_sync {
            engine.start_periodic(Duration::from_secs(config.sync.sync_interval));
            if connectivity.is_online() {
                engine.trigger(PassTrigger::Startup);
            }
        }

        tracing::info!(
            target: "offline::store",
            auto_sync = config.sync.auto_sync,
            max_retries = config.sync.max_retries,
            photo_policy = ?config.photos.policy,
            "offline runtime opened"
        );

        Ok(Self {
            config,
            store,
            queue,
            photos,
            engine,
            cache,
            connectivity,
            watcher,
        })
    }

    /// Stops background work and closes the store. In-flight passes finish
    /// against a closed store and record nothing.
    pub async fn close(&self) {
        self.watcher.stop();
        self.engine.shutdown();
        self.store.close().await;
        tracing::info!(target: "offline::store", "offline runtime closed");
    }
}

fn build_handlers(
    backend: &RemoteBackend,
    photos: Arc<PhotoUploader>,
    merchant_config: &MerchantConfig,
) -> Result<HandlerRegistry, AppError> {
    let generic = Arc::new(RemoteEntityHandler::new(Arc::clone(&backend.api)));
    let merchants = Arc::new(MerchantHandler::new(
        Arc::clone(&backend.api),
        photos,
        merchant_config,
    ));

    HandlerRegistry::builder()
        .register_all(
            EntityKind::ALL
                .into_iter()
                .filter(|kind| *kind != EntityKind::Merchants),
            generic,
        )
        .register(EntityKind::Merchants, merchants)
        .build_complete()
}
