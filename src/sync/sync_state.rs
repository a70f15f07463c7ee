//! # Sync State Management
//!
//! The single-pass guard and the observable state of the engine.

use crate::sync::retention::CleanupStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Engine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    Idle,
    Syncing,
}

/// In-process "a pass is running" flag
#[derive(Debug, Default)]
pub struct PassFlag {
    running: AtomicBool,
}

impl PassFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag; `None` if another pass holds it
    pub fn try_acquire(&self) -> Option<PassGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard { flag: &self.running })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> SyncPhase {
        if self.is_running() {
            SyncPhase::Syncing
        } else {
            SyncPhase::Idle
        }
    }
}

/// Releases the pass flag when dropped, including on panic or cancellation
#[derive(Debug)]
pub struct PassGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Outcome counts of one sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Entries the remote accepted
    pub applied: u32,
    /// Entries that failed and stay queued
    pub retried: u32,
    /// Entries dropped (retries exhausted or rejected)
    pub abandoned: u32,
    /// Entries not attempted this pass (backoff or an earlier entry for the
    /// same record still pending)
    pub deferred: u32,
    /// Retention result, when cleanup ran after the pass
    pub cleanup: Option<CleanupStats>,
}

impl PassReport {
    /// Entries sent to the remote
    pub fn attempted(&self) -> u32 {
        self.applied + self.retried + self.abandoned
    }
}

/// Snapshot of what the engine last did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub phase: SyncPhase,
    pub last_report: Option<PassReport>,
    pub last_pass_finished: Option<DateTime<Utc>>,
    /// Error that aborted the most recent pass, cleared by the next completed one
    pub last_error: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            last_report: None,
            last_pass_finished: None,
            last_error: None,
        }
    }
}
