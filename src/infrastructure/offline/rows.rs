use crate::domain::entities::offline::{CacheEntry, QueueItem};
use crate::domain::value_objects::offline::{
    CacheKey, EntityKind, QueueAction, QueueItemStatus, QueuePayload, SyncQueueId,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

fn timestamp(millis: i64, column: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::DeserializationError(format!("Invalid {column} timestamp")))
}

pub(super) fn map_queue_item(row: &SqliteRow) -> Result<QueueItem, AppError> {
    let id = SyncQueueId::new(row.try_get::<i64, _>("id")?)
        .map_err(AppError::DeserializationError)?;
    let entity_kind = EntityKind::from_value(row.try_get::<String, _>("entity_kind")?.as_str())
        .map_err(AppError::DeserializationError)?;
    let action = QueueAction::from_value(row.try_get::<String, _>("action")?.as_str())
        .map_err(AppError::DeserializationError)?;
    let payload = QueuePayload::from_json_str(row.try_get::<String, _>("payload")?.as_str())
        .map_err(AppError::DeserializationError)?;
    let status = QueueItemStatus::from_value(row.try_get::<String, _>("status")?.as_str())
        .map_err(AppError::DeserializationError)?;
    let retry_count = u32::try_from(row.try_get::<i64, _>("retry_count")?)
        .map_err(|_| AppError::DeserializationError("Negative retry_count".to_string()))?;
    let created_at = timestamp(row.try_get::<i64, _>("created_at")?, "created_at")?;
    let last_retry_at = row
        .try_get::<Option<i64>, _>("last_retry_at")?
        .map(|millis| timestamp(millis, "last_retry_at"))
        .transpose()?;

    Ok(QueueItem {
        id,
        entity_kind,
        action,
        payload,
        status,
        created_at,
        retry_count,
        last_retry_at,
        last_error: row.try_get::<Option<String>, _>("last_error")?,
    })
}

pub(super) fn map_cache_entry(row: &SqliteRow) -> Result<CacheEntry, AppError> {
    let key = CacheKey::new(row.try_get::<String, _>("cache_key")?)
        .map_err(AppError::DeserializationError)?;
    let value = serde_json::from_str(row.try_get::<String, _>("value")?.as_str())
        .map_err(|err| AppError::DeserializationError(err.to_string()))?;
    let updated_at = timestamp(row.try_get::<i64, _>("updated_at")?, "updated_at")?;

    Ok(CacheEntry::new(key, value, updated_at))
}
