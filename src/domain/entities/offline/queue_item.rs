use crate::domain::sync::BackoffPolicy;
use crate::domain::value_objects::offline::{
    EntityKind, QueueAction, QueueItemStatus, QueuePayload, SyncQueueId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: SyncQueueId,
    pub entity_kind: EntityKind,
    pub action: QueueAction,
    pub payload: QueuePayload,
    pub status: QueueItemStatus,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl QueueItem {
    /// Exhausted items stay queued but are never picked by automatic passes.
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.status == QueueItemStatus::Exhausted || self.retry_count >= max_retries
    }

    /// 次に再試行できる時刻（未失敗なら None = 即時）
    pub fn next_attempt_at(&self, policy: &BackoffPolicy) -> Option<DateTime<Utc>> {
        if self.retry_count == 0 {
            return None;
        }
        let last = self.last_retry_at?;
        let delay = chrono::Duration::from_std(policy.delay_after(self.retry_count))
            .unwrap_or(chrono::Duration::MAX);
        last.checked_add_signed(delay)
    }

    pub fn is_due(&self, now: DateTime<Utc>, policy: &BackoffPolicy) -> bool {
        match self.next_attempt_at(policy) {
            Some(at) => now >= at,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueItemDraft {
    pub entity_kind: EntityKind,
    pub action: QueueAction,
    pub payload: QueuePayload,
    pub created_at: DateTime<Utc>,
}

impl QueueItemDraft {
    pub fn new(
        entity_kind: EntityKind,
        action: QueueAction,
        payload: QueuePayload,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_kind,
            action,
            payload,
            created_at,
        }
    }
}

/// Partial update merged into an existing item; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueItemPatch {
    pub status: Option<QueueItemStatus>,
    pub retry_count: Option<u32>,
    pub last_retry_at: Option<Option<DateTime<Utc>>>,
    pub last_error: Option<Option<String>>,
}

impl QueueItemPatch {
    pub fn failure(
        retry_count: u32,
        at: DateTime<Utc>,
        error: impl Into<String>,
        status: QueueItemStatus,
    ) -> Self {
        Self {
            status: Some(status),
            retry_count: Some(retry_count),
            last_retry_at: Some(Some(at)),
            last_error: Some(Some(error.into())),
        }
    }

    /// Operator retry: forget previous failures.
    pub fn reset() -> Self {
        Self {
            status: Some(QueueItemStatus::Pending),
            retry_count: Some(0),
            last_retry_at: Some(None),
            last_error: Some(None),
        }
    }

    pub fn apply_to(&self, item: &mut QueueItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(retry_count) = self.retry_count {
            item.retry_count = retry_count;
        }
        if let Some(last_retry_at) = self.last_retry_at {
            item.last_retry_at = last_retry_at;
        }
        if let Some(last_error) = &self.last_error {
            item.last_error = last_error.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueFilter {
    pub entity_kind: Option<EntityKind>,
    pub status: Option<QueueItemStatus>,
}

impl QueueFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_kind(kind: Option<EntityKind>) -> Self {
        Self {
            entity_kind: kind,
            status: None,
        }
    }

    pub fn with_status(status: QueueItemStatus) -> Self {
        Self {
            entity_kind: None,
            status: Some(status),
        }
    }

    pub fn matches(&self, item: &QueueItem) -> bool {
        self.entity_kind.is_none_or(|kind| kind == item.entity_kind)
            && self.status.is_none_or(|status| status == item.status)
    }
}
