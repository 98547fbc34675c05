use crate::shared::error::AppError;
use thiserror::Error;

/// Classification of a failed apply attempt.
#[derive(Debug, Error)]
pub enum SyncFailure {
    /// Counts against the retry budget; the item is retried after backoff.
    #[error("{0}")]
    Retryable(#[source] AppError),
    /// No retry can help; the item is exhausted immediately.
    #[error("{0}")]
    Permanent(#[source] AppError),
}

impl SyncFailure {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncFailure::Retryable(_))
    }

    pub fn error(&self) -> &AppError {
        match self {
            SyncFailure::Retryable(err) | SyncFailure::Permanent(err) => err,
        }
    }
}

impl From<AppError> for SyncFailure {
    fn from(err: AppError) -> Self {
        if err.is_retryable() {
            SyncFailure::Retryable(err)
        } else {
            SyncFailure::Permanent(err)
        }
    }
}
