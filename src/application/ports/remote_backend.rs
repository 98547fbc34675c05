use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// Generic create/read/update/delete access to the hosted backend.
#[async_trait]
pub trait RemoteWriteApi: Send + Sync {
    async fn insert(&self, collection: &str, payload: &Value) -> Result<(), AppError>;
    async fn update(&self, collection: &str, id: &str, payload: &Value) -> Result<(), AppError>;
    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError>;
    /// 自然キーで既存レコードを探す（競合チェック用）
    async fn find_by_key(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Value>, AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject<'a> {
    pub path: &'a str,
    pub bytes: &'a [u8],
    pub content_type: &'a str,
}

/// Remote object storage; returns a resolvable URL for the stored object.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, object: StorageObject<'_>) -> Result<String, AppError>;
}
