use crate::application::ports::clock::Clock;
use crate::application::ports::offline_store::{OfflineStore, Partition};
use crate::domain::entities::offline::CacheEntry;
use crate::domain::value_objects::offline::CacheKey;
use crate::shared::error::AppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// 読み取りキャッシュ（あくまで補助。失敗はすべてミス扱い）
pub struct CacheService {
    store: Arc<dyn OfflineStore>,
    clock: Arc<dyn Clock>,
    ttl: Option<chrono::Duration>,
}

impl CacheService {
    pub fn new(store: Arc<dyn OfflineStore>, clock: Arc<dyn Clock>, ttl: Option<Duration>) -> Self {
        Self {
            store,
            clock,
            ttl: ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()),
        }
    }

    fn parse_key(key: &str) -> Option<CacheKey> {
        match CacheKey::new(key) {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::debug!(target: "offline::cache", error = %err, "invalid cache key");
                None
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let key = Self::parse_key(key)?;
        match self.store.get_cache_entry(&key).await {
            Ok(Some(entry)) if !entry.is_expired(self.clock.now(), self.ttl) => Some(entry.value),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(
                    target: "offline::cache",
                    key = %key,
                    error = %err,
                    "cache read failed, treating as miss"
                );
                None
            }
        }
    }

    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        serde_json::from_value(value).ok()
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        let Some(key) = Self::parse_key(key) else {
            return;
        };
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(target: "offline::cache", key = %key, error = %err, "value not cacheable");
                return;
            }
        };
        let entry = CacheEntry::new(key, value, self.clock.now());
        if let Err(err) = self.store.put_cache_entry(&entry).await {
            tracing::warn!(
                target: "offline::cache",
                key = %entry.key,
                error = %err,
                "cache write failed"
            );
        }
    }

    /// Returns the cached value, or fetches, stores and returns a fresh one.
    /// Fetcher errors propagate; cache errors never do.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, fetcher: F) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(cached) = self.get_as::<T>(key).await {
            return Ok(cached);
        }
        let fresh = fetcher().await?;
        self.put(key, &fresh).await;
        Ok(fresh)
    }

    pub async fn invalidate(&self, key: &str) {
        let Some(key) = Self::parse_key(key) else {
            return;
        };
        if let Err(err) = self.store.delete_cache_entry(&key).await {
            tracing::warn!(target: "offline::cache", key = %key, error = %err, "cache invalidation failed");
        }
    }

    pub async fn clear(&self) {
        if let Err(err) = self.store.clear(Partition::Cache).await {
            tracing::warn!(target: "offline::cache", error = %err, "cache clear failed");
        }
    }

    /// Drops entries older than the TTL; returns how many were removed.
    pub async fn purge_expired(&self) -> u64 {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let cutoff = self.clock.now() - ttl;
        match self.store.delete_cache_entries_older_than(cutoff).await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!(target: "offline::cache", removed, "expired cache entries purged");
                }
                removed
            }
            Err(err) => {
                tracing::warn!(target: "offline::cache", error = %err, "cache purge failed");
                0
            }
        }
    }
}
