use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// キューに積まれる変更内容（JSON）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuePayload(Value);

impl QueuePayload {
    pub fn new(value: Value) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("Invalid JSON payload: {e}"))?;
        Self::new(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    /// Top-level string field, if present.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Remote record id, accepted as a string or a number.
    pub fn record_id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    fn validate(value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Err("Queue payload cannot be null".to_string());
        }
        Ok(())
    }
}

impl From<QueuePayload> for Value {
    fn from(payload: QueuePayload) -> Self {
        payload.0
    }
}
