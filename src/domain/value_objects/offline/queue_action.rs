use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    Create,
    Update,
    Delete,
}

impl QueueAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueAction::Create => "create",
            QueueAction::Update => "update",
            QueueAction::Delete => "delete",
        }
    }

    pub fn from_value(value: &str) -> Result<Self, String> {
        match value.trim() {
            "create" => Ok(QueueAction::Create),
            "update" => Ok(QueueAction::Update),
            "delete" => Ok(QueueAction::Delete),
            other => Err(format!("Unknown queue action: {other}")),
        }
    }
}

impl fmt::Display for QueueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
