use crate::domain::value_objects::offline::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: CacheKey, value: Value, updated_at: DateTime<Utc>) -> Self {
        Self {
            key,
            value,
            updated_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Option<chrono::Duration>) -> bool {
        match ttl {
            Some(ttl) => now - self.updated_at > ttl,
            None => false,
        }
    }
}
