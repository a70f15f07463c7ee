//! # Sync Metrics
//!
//! In-process counters about sync passes. Not persisted.

use crate::sync::sync_state::PassReport;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncMetrics {
    /// Passes that acquired the guard
    pub total_passes: u64,
    pub completed_passes: u64,
    /// Passes aborted by a storage error
    pub failed_passes: u64,
    /// Triggers ignored because the device was offline
    pub skipped_offline: u64,
    /// Triggers coalesced into a pass already running
    pub coalesced: u64,
    pub entries_applied: u64,
    pub entries_abandoned: u64,
    pub average_pass_duration: Duration,
    pub last_pass_duration: Option<Duration>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass_start(&mut self) {
        self.total_passes += 1;
    }

    pub fn record_pass_completed(&mut self, duration: Duration, report: &PassReport) {
        self.completed_passes = self.completed_passes.saturating_add(1);
        self.entries_applied += report.applied as u64;
        self.entries_abandoned += report.abandoned as u64;
        self.last_pass_duration = Some(duration);

        // Incremental mean in f64 seconds; no integer overflow at any pass count
        let average = self.average_pass_duration.as_secs_f64();
        let next = average + (duration.as_secs_f64() - average) / self.completed_passes as f64;
        self.average_pass_duration =
            Duration::try_from_secs_f64(next).unwrap_or(self.average_pass_duration);
    }

    pub fn record_pass_failed(&mut self) {
        self.failed_passes += 1;
    }

    pub fn record_skipped_offline(&mut self) {
        self.skipped_offline += 1;
    }

    pub fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_passes == 0 {
            0.0
        } else {
            self.completed_passes as f64 / self.total_passes as f64
        }
    }
}
