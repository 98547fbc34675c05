#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use julaba_offline::application::ports::clock::Clock;
use julaba_offline::application::ports::offline_store::OfflineStore;
use julaba_offline::application::ports::remote_backend::{
    ObjectStorage, RemoteWriteApi, StorageObject,
};
use julaba_offline::application::services::sync::{
    ApplyOutcome, HandlerRegistry, MerchantHandler, RemoteEntityHandler, SyncEngine,
    SyncEngineConfig, SyncHandler,
};
use julaba_offline::application::services::{PhotoUploader, QueueService, QueueServiceTrait};
use julaba_offline::domain::entities::offline::QueueItem;
use julaba_offline::domain::value_objects::offline::{
    EntityKind, QueueAction, QueuePayload, SyncQueueId,
};
use julaba_offline::infrastructure::connectivity::NetworkMonitor;
use julaba_offline::infrastructure::offline::SqliteOfflineStore;
use julaba_offline::shared::AppConfig;
use julaba_offline::shared::AppError;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 手動で進める時計
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Starts at the current time truncated to milliseconds, the store's precision.
    pub fn new() -> Self {
        let start = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += ChronoDuration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Insert(String, Value),
    Update(String, String),
    Delete(String, String),
}

/// Hosted backend double: records writes and uploads, knows a set of existing natural keys.
#[derive(Default)]
pub struct FakeBackend {
    writes: Mutex<Vec<Write>>,
    uploads: Mutex<Vec<String>>,
    lookups: AtomicUsize,
    existing_keys: Mutex<HashSet<String>>,
    failing: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_existing_key(&self, key: &str) {
        self.existing_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn write(&self, write: Write) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Network("connection reset".into()));
        }
        self.writes.lock().unwrap().push(write);
        Ok(())
    }
}

#[async_trait]
impl RemoteWriteApi for FakeBackend {
    async fn insert(&self, collection: &str, payload: &Value) -> Result<(), AppError> {
        self.write(Write::Insert(collection.to_string(), payload.clone()))
    }

    async fn update(&self, collection: &str, id: &str, _payload: &Value) -> Result<(), AppError> {
        self.write(Write::Update(collection.to_string(), id.to_string()))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.write(Write::Delete(collection.to_string(), id.to_string()))
    }

    async fn find_by_key(
        &self,
        _collection: &str,
        _field: &str,
        value: &str,
    ) -> Result<Option<Value>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Network("connection reset".into()));
        }
        let exists = self.existing_keys.lock().unwrap().contains(value);
        Ok(exists.then(|| json!({ "id": 42 })))
    }
}

#[async_trait]
impl ObjectStorage for FakeBackend {
    async fn upload(&self, object: StorageObject<'_>) -> Result<String, AppError> {
        self.uploads.lock().unwrap().push(object.path.to_string());
        Ok(format!("https://storage.test/{}", object.path))
    }
}

/// Handler that always fails with a retryable error.
#[derive(Default)]
pub struct FailingHandler {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SyncHandler for FailingHandler {
    async fn apply(&self, _item: &QueueItem) -> Result<ApplyOutcome, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::remote(500, "internal server error"))
    }
}

pub struct Harness {
    pub store: Arc<SqliteOfflineStore>,
    pub queue: Arc<QueueService>,
    pub engine: Arc<SyncEngine>,
    pub backend: Arc<FakeBackend>,
    pub clock: Arc<ManualClock>,
    pub monitor: Arc<NetworkMonitor>,
}

impl Harness {
    pub async fn enqueue(&self, kind: EntityKind, action: QueueAction, payload: Value) -> SyncQueueId {
        self.queue
            .enqueue(kind, action, QueuePayload::new(payload).unwrap())
            .await
            .unwrap()
    }

    pub async fn count(&self) -> u64 {
        self.queue.count(None).await.unwrap()
    }
}

pub fn engine_config() -> SyncEngineConfig {
    SyncEngineConfig::from(&AppConfig::default().sync)
}

/// Store, queue and engine wired to the fake backend with every entity kind handled.
pub async fn harness(online: bool) -> Harness {
    let backend = FakeBackend::new();
    let config = AppConfig::default();
    let photos = Arc::new(PhotoUploader::new(backend.clone(), config.photos));
    let registry = HandlerRegistry::builder()
        .register_all(
            EntityKind::ALL,
            Arc::new(RemoteEntityHandler::new(backend.clone())),
        )
        .register(
            EntityKind::Merchants,
            Arc::new(MerchantHandler::new(
                backend.clone(),
                photos,
                &config.merchants,
            )),
        )
        .build_complete()
        .unwrap();
    harness_with(online, registry, backend).await
}

pub async fn harness_with(
    online: bool,
    registry: HandlerRegistry,
    backend: Arc<FakeBackend>,
) -> Harness {
    let store = Arc::new(SqliteOfflineStore::in_memory());
    store.initialize().await.unwrap();
    let clock = Arc::new(ManualClock::new());
    let config = engine_config();
    let queue = Arc::new(QueueService::new(
        store.clone(),
        clock.clone(),
        config.max_retries,
    ));
    let monitor = Arc::new(NetworkMonitor::new(online));
    let engine = Arc::new(SyncEngine::new(
        queue.clone(),
        Arc::new(registry),
        monitor.clone(),
        clock.clone(),
        config,
    ));
    Harness {
        store,
        queue,
        engine,
        backend,
        clock,
        monitor,
    }
}
