use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aggregate outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub synced_count: u32,
    pub conflict_count: u32,
    pub failed_count: u32,
    pub exhausted_count: u32,
    pub skipped_count: u32,
    pub remaining_count: u32,
    pub next_retry_in: Option<Duration>,
    pub was_offline: bool,
}

impl SyncReport {
    pub fn offline() -> Self {
        Self {
            was_offline: true,
            ..Self::default()
        }
    }

    /// Items removed from the queue during the pass.
    pub fn resolved_count(&self) -> u32 {
        self.synced_count + self.conflict_count
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count > 0 || self.exhausted_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    AlreadyRunning,
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::AlreadyRunning => None,
        }
    }
}
