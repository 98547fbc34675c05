use serde::{Deserialize, Serialize};

/// 永続化されるキュー項目の状態
///
/// `Applying`/`Applied` only exist inside a sync pass: an applied item is
/// deleted, so they are never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    Failed,
    Exhausted,
}

impl QueueItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueItemStatus::Pending => "pending",
            QueueItemStatus::Failed => "failed",
            QueueItemStatus::Exhausted => "exhausted",
        }
    }

    pub fn from_value(value: &str) -> Result<Self, String> {
        match value {
            "pending" => Ok(QueueItemStatus::Pending),
            "failed" => Ok(QueueItemStatus::Failed),
            "exhausted" => Ok(QueueItemStatus::Exhausted),
            other => Err(format!("Unknown queue item status: {other}")),
        }
    }
}
