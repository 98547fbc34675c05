use std::fmt;

#[derive(Debug)]
pub enum AppError {
    StorageUnavailable(String),
    ItemNotFound(String),
    HandlerMissing(String),
    ConflictAlreadyApplied(String),
    MalformedImageData(String),
    ImageTooLarge(String),
    UploadFailed(String),
    Remote { status: u16, message: String },
    Database(String),
    Network(String),
    Timeout(String),
    ValidationError(String),
    ConfigurationError(String),
    SerializationError(String),
    DeserializationError(String),
    Internal(String),
}

impl AppError {
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        AppError::Remote {
            status,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            AppError::ItemNotFound(_) => "ITEM_NOT_FOUND",
            AppError::HandlerMissing(_) => "HANDLER_MISSING",
            AppError::ConflictAlreadyApplied(_) => "CONFLICT_ALREADY_APPLIED",
            AppError::MalformedImageData(_) => "MALFORMED_IMAGE_DATA",
            AppError::ImageTooLarge(_) => "IMAGE_TOO_LARGE",
            AppError::UploadFailed(_) => "UPLOAD_FAILED",
            AppError::Remote { .. } => "REMOTE_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            AppError::SerializationError(_) => "SERIALIZATION_ERROR",
            AppError::DeserializationError(_) => "DESERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// UIにそのまま表示できるメッセージ
    pub fn user_message(&self) -> String {
        match self {
            AppError::StorageUnavailable(_) => {
                "Offline mode is unavailable on this device".to_string()
            }
            AppError::ItemNotFound(_) => "This pending action no longer exists".to_string(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::Network(_) | AppError::Timeout(_) => {
                "The server could not be reached. Your action is saved locally".to_string()
            }
            AppError::UploadFailed(_) => "The photo could not be uploaded".to_string(),
            AppError::MalformedImageData(_) => "The photo is corrupted".to_string(),
            AppError::ImageTooLarge(_) => "The photo is too large to upload".to_string(),
            _ => self.to_string(),
        }
    }

    /// Remote failures are assumed transient; only local defects are permanent.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AppError::HandlerMissing(_)
                | AppError::MalformedImageData(_)
                | AppError::ImageTooLarge(_)
                | AppError::ValidationError(_)
                | AppError::ConfigurationError(_)
                | AppError::SerializationError(_)
                | AppError::DeserializationError(_)
                | AppError::ConflictAlreadyApplied(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            AppError::ItemNotFound(msg) => write!(f, "Queue item not found: {}", msg),
            AppError::HandlerMissing(msg) => write!(f, "No sync handler registered: {}", msg),
            AppError::ConflictAlreadyApplied(msg) => write!(f, "Already applied remotely: {}", msg),
            AppError::MalformedImageData(msg) => write!(f, "Malformed image data: {}", msg),
            AppError::ImageTooLarge(msg) => write!(f, "Image too large: {}", msg),
            AppError::UploadFailed(msg) => write!(f, "Upload failed: {}", msg),
            AppError::Remote { status, message } => {
                write!(f, "Remote error ({}): {}", status, message)
            }
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
                AppError::StorageUnavailable(err.to_string())
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            AppError::remote(status.as_u16(), err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::UploadFailed("503".into()).is_retryable());
        assert!(AppError::remote(500, "boom").is_retryable());
        assert!(AppError::Timeout("slow".into()).is_retryable());
        assert!(!AppError::HandlerMissing("invoices".into()).is_retryable());
        assert!(!AppError::MalformedImageData("bad".into()).is_retryable());
        assert!(!AppError::ImageTooLarge("6MB".into()).is_retryable());
        assert!(!AppError::ValidationError("no id".into()).is_retryable());
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            AppError::StorageUnavailable("denied".into()).code(),
            "STORAGE_UNAVAILABLE"
        );
        assert_eq!(AppError::remote(409, "dup").code(), "REMOTE_ERROR");
        assert_eq!(
            AppError::remote(409, "dup").to_string(),
            "Remote error (409): dup"
        );
    }
}
