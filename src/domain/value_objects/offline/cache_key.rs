use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_CACHE_KEY_LEN: usize = 256;

/// Key of a read-through cache entry, e.g. `merchants:JUL-ABJ-0042`.
///
/// Surrounding whitespace is stripped so `" products "` and `"products"`
/// address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("Cache key cannot be empty".to_string());
        }
        if trimmed.len() > MAX_CACHE_KEY_LEN {
            return Err(format!("Cache key exceeds {MAX_CACHE_KEY_LEN} bytes"));
        }
        if trimmed.chars().any(char::is_control) {
            return Err("Cache key cannot contain control characters".to_string());
        }

        if trimmed.len() == value.len() {
            Ok(Self(value))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CacheKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(value: CacheKey) -> Self {
        value.0
    }
}
