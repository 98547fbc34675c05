use crate::application::ports::remote_backend::{ObjectStorage, RemoteWriteApi, StorageObject};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Insert(String, Value),
    Update(String, String, Value),
    Delete(String, String),
    Find(String, String, String),
    Upload(String),
}

/// In-memory backend recording every call.
#[derive(Default)]
pub struct MockBackend {
    pub calls: Mutex<Vec<RemoteCall>>,
    pub existing_keys: Mutex<HashSet<String>>,
    pub fail_writes: AtomicBool,
    pub fail_uploads: AtomicBool,
}

impl MockBackend {
    pub fn with_existing_key(key: &str) -> Self {
        let backend = Self::default();
        backend.existing_keys.lock().unwrap().insert(key.to_string());
        backend
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    RemoteCall::Insert(..) | RemoteCall::Update(..) | RemoteCall::Delete(..)
                )
            })
            .count()
    }

    fn record(&self, call: RemoteCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn write_result(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(AppError::remote(503, "unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteWriteApi for MockBackend {
    async fn insert(&self, collection: &str, payload: &Value) -> Result<(), AppError> {
        self.record(RemoteCall::Insert(collection.into(), payload.clone()));
        self.write_result()
    }

    async fn update(&self, collection: &str, id: &str, payload: &Value) -> Result<(), AppError> {
        self.record(RemoteCall::Update(
            collection.into(),
            id.into(),
            payload.clone(),
        ));
        self.write_result()
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.record(RemoteCall::Delete(collection.into(), id.into()));
        self.write_result()
    }

    async fn find_by_key(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Value>, AppError> {
        self.record(RemoteCall::Find(collection.into(), field.into(), value.into()));
        let exists = self.existing_keys.lock().unwrap().contains(value);
        Ok(exists.then(|| json!({ "id": format!("remote-{value}") })))
    }
}

#[async_trait]
impl ObjectStorage for MockBackend {
    async fn upload(&self, object: StorageObject<'_>) -> Result<String, AppError> {
        self.record(RemoteCall::Upload(object.path.to_string()));
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::UploadFailed("503 Service Unavailable".into()));
        }
        Ok(format!("https://cdn.test/{}", object.path))
    }
}
