use crate::domain::entities::offline::{QueueItem, SyncOutcome, SyncReport};
use crate::presentation::dto::Validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_PAYLOAD_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub entity_kind: String,
    pub action: String,
    pub payload: Value,
}

impl Validate for EnqueueRequest {
    fn validate(&self) -> Result<(), String> {
        if self.entity_kind.trim().is_empty() {
            return Err("Entity kind is required".to_string());
        }
        if self.action.trim().is_empty() {
            return Err("Action is required".to_string());
        }
        if !self.payload.is_object() {
            return Err("Payload must be a JSON object".to_string());
        }
        let action = self.action.trim();
        if (action == "update" || action == "delete") && self.payload.get("id").is_none() {
            return Err(format!("Payload for {action} must include an id"));
        }
        let size = serde_json::to_vec(&self.payload)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX);
        if size > MAX_PAYLOAD_BYTES {
            return Err("Payload is too large (max 8MB)".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub id: i64,
    pub pending_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQueueRequest {
    pub entity_kind: Option<String>,
    #[serde(default)]
    pub needs_attention_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemResponse {
    pub id: i64,
    pub entity_kind: String,
    pub action: String,
    pub payload: Value,
    pub status: String,
    pub retry_count: u32,
    pub created_at: i64,
    pub last_retry_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<QueueItem> for QueueItemResponse {
    fn from(item: QueueItem) -> Self {
        Self {
            id: item.id.value(),
            entity_kind: item.entity_kind.as_str().to_string(),
            action: item.action.as_str().to_string(),
            status: item.status.as_str().to_string(),
            retry_count: item.retry_count,
            created_at: item.created_at.timestamp_millis(),
            last_retry_at: item.last_retry_at.map(|at| at.timestamp_millis()),
            last_error: item.last_error,
            payload: item.payload.into_inner(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReportResponse {
    pub already_running: bool,
    pub was_offline: bool,
    pub synced_count: u32,
    pub conflict_count: u32,
    pub failed_count: u32,
    pub exhausted_count: u32,
    pub skipped_count: u32,
    pub remaining_count: u32,
    pub next_retry_in_ms: Option<u64>,
}

impl From<&SyncReport> for SyncReportResponse {
    fn from(report: &SyncReport) -> Self {
        Self {
            already_running: false,
            was_offline: report.was_offline,
            synced_count: report.synced_count,
            conflict_count: report.conflict_count,
            failed_count: report.failed_count,
            exhausted_count: report.exhausted_count,
            skipped_count: report.skipped_count,
            remaining_count: report.remaining_count,
            next_retry_in_ms: report
                .next_retry_in
                .map(|delay| delay.as_millis() as u64),
        }
    }
}

impl From<SyncOutcome> for SyncReportResponse {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Completed(report) => Self::from(&report),
            SyncOutcome::AlreadyRunning => Self {
                already_running: true,
                ..Self::default()
            },
        }
    }
}

/// バッジ表示用の同期状況
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingStatusResponse {
    pub pending_count: u64,
    pub needs_attention_count: u64,
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync_at: Option<i64>,
    pub last_remaining: Option<u32>,
}
