use crate::domain::entities::offline::SyncReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcomeStatus {
    Clean,
    WithFailures,
    Offline,
}

impl PassOutcomeStatus {
    fn from_report(report: &SyncReport) -> Self {
        if report.was_offline {
            PassOutcomeStatus::Offline
        } else if report.has_failures() {
            PassOutcomeStatus::WithFailures
        } else {
            PassOutcomeStatus::Clean
        }
    }
}

/// Where a pass was started from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PassTrigger {
    Startup,
    Manual,
    Connectivity,
    FollowUp,
    Timer,
    Rerun,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSyncMetricsSnapshot {
    pub total_passes: u64,
    pub total_synced: u64,
    pub total_conflicts: u64,
    pub total_failures: u64,
    pub total_exhausted: u64,
    pub consecutive_failed_passes: u64,
    pub skipped_reentrant: u64,
    pub last_outcome: Option<PassOutcomeStatus>,
    pub last_trigger: Option<PassTrigger>,
    pub last_duration_ms: Option<u64>,
    pub last_remaining: Option<u32>,
    pub last_next_retry_ms: Option<u64>,
    pub last_finished_at: Option<DateTime<Utc>>,
}

#[derive(Default, Clone)]
struct LastPassMetadata {
    outcome: Option<PassOutcomeStatus>,
    trigger: Option<PassTrigger>,
    duration_ms: Option<u64>,
    remaining: Option<u32>,
    next_retry_ms: Option<u64>,
    finished_at: Option<DateTime<Utc>>,
}

/// 同期パスの集計カウンタ
///
/// One instance per engine; counters are monotonic for the engine's lifetime.
#[derive(Default)]
pub struct OfflineSyncMetrics {
    passes: AtomicU64,
    synced: AtomicU64,
    conflicts: AtomicU64,
    failures: AtomicU64,
    exhausted: AtomicU64,
    consecutive_failed_passes: AtomicU64,
    skipped_reentrant: AtomicU64,
    metadata: Mutex<LastPassMetadata>,
}

impl OfflineSyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(
        &self,
        trigger: PassTrigger,
        report: &SyncReport,
        duration_ms: u64,
        finished_at: DateTime<Utc>,
    ) {
        let outcome = PassOutcomeStatus::from_report(report);
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.synced
            .fetch_add(u64::from(report.synced_count), Ordering::Relaxed);
        self.conflicts
            .fetch_add(u64::from(report.conflict_count), Ordering::Relaxed);
        self.failures
            .fetch_add(u64::from(report.failed_count), Ordering::Relaxed);
        self.exhausted
            .fetch_add(u64::from(report.exhausted_count), Ordering::Relaxed);

        match outcome {
            PassOutcomeStatus::WithFailures => {
                self.consecutive_failed_passes
                    .fetch_add(1, Ordering::Relaxed);
            }
            PassOutcomeStatus::Clean => {
                self.consecutive_failed_passes.store(0, Ordering::Relaxed);
            }
            PassOutcomeStatus::Offline => {}
        }

        if let Ok(mut guard) = self.metadata.lock() {
            guard.outcome = Some(outcome);
            guard.trigger = Some(trigger);
            guard.duration_ms = Some(duration_ms);
            guard.remaining = Some(report.remaining_count);
            guard.next_retry_ms = report
                .next_retry_in
                .map(|delay| delay.as_millis() as u64);
            guard.finished_at = Some(finished_at);
        }
    }

    pub fn record_reentrant_skip(&self) {
        self.skipped_reentrant.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OfflineSyncMetricsSnapshot {
        let metadata = self
            .metadata
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();

        OfflineSyncMetricsSnapshot {
            total_passes: self.passes.load(Ordering::Relaxed),
            total_synced: self.synced.load(Ordering::Relaxed),
            total_conflicts: self.conflicts.load(Ordering::Relaxed),
            total_failures: self.failures.load(Ordering::Relaxed),
            total_exhausted: self.exhausted.load(Ordering::Relaxed),
            consecutive_failed_passes: self.consecutive_failed_passes.load(Ordering::Relaxed),
            skipped_reentrant: self.skipped_reentrant.load(Ordering::Relaxed),
            last_outcome: metadata.outcome,
            last_trigger: metadata.trigger,
            last_duration_ms: metadata.duration_ms,
            last_remaining: metadata.remaining,
            last_next_retry_ms: metadata.next_retry_ms,
            last_finished_at: metadata.finished_at,
        }
    }
}
