//! # Sync Engine
//!
//! Drains the mutation queue against the remote API whenever the device is
//! online, one pass at a time.
//!
//! ## Architecture
//!
//! - **Network Monitor**: the connectivity signal; offline→online starts a pass
//! - **Scheduler**: optional periodic trigger
//! - **Sync State**: the single-pass guard and the last pass outcome
//! - **Retention**: cleanup run after every completed pass
//! - **Metrics**: in-process pass counters
//!
//! ## Pass Algorithm
//!
//! A pass takes a snapshot of the queue and walks it in enqueue order,
//! awaiting each remote call before the next. Success removes the entry and
//! cleans the record; a transient failure counts against the retry budget and
//! leaves the entry for a later pass; a permanent failure drops it. Once an
//! entry for a record stays queued, later entries for that record wait too.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use practice_sync::local_db::LocalDatabase;
//! use practice_sync::remote::HttpRemoteApi;
//! use practice_sync::shared::SyncConfig;
//! use practice_sync::sync::{ConnectivitySignal, SyncEngine};
//! use std::sync::Arc;
//!
//! # async fn example() -> practice_sync::shared::Result<()> {
//! let config = SyncConfig::default();
//! let db = Arc::new(LocalDatabase::open_default().await?);
//! let remote = Arc::new(HttpRemoteApi::new("http://127.0.0.1:3000", None, config.request_timeout())?);
//! let connectivity = ConnectivitySignal::online();
//!
//! let engine = SyncEngine::new(db, remote, connectivity.clone(), config)?;
//! engine.start().await?;
//!
//! // Later: the platform reports a network change
//! connectivity.set_online(false);
//!
//! let stats = engine.get_stats().await?;
//! println!("{} items pending sync", stats.pending_sync);
//! # Ok(())
//! # }
//! ```

pub mod metrics;
pub mod network_monitor;
pub mod retention;
pub mod scheduler;
pub mod sync_state;

pub use metrics::SyncMetrics;
pub use network_monitor::{ConnectivitySignal, NetworkStatus};
pub use retention::{CleanupStats, Retention};
pub use scheduler::SyncScheduler;
pub use sync_state::{PassFlag, PassGuard, PassReport, SyncPhase, SyncState};

use crate::local_db::{FailureOutcome, LocalDatabase};
use crate::offline::{MutationQueue, RetryPolicy};
use crate::remote::{RemoteApi, RemoteError};
use crate::shared::config::SyncConfig;
use crate::shared::error::{Result, SyncError};
use crate::shared::records::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// What started a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTrigger {
    /// Application start with a non-empty queue
    Startup,
    /// Connectivity came back
    Reconnect,
    /// Periodic scheduler tick
    Periodic,
    /// Explicit user request; ignores backoff
    Manual,
}

impl PassTrigger {
    fn respects_backoff(&self) -> bool {
        !matches!(self, PassTrigger::Manual)
    }
}

impl fmt::Display for PassTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassTrigger::Startup => "startup",
            PassTrigger::Reconnect => "reconnect",
            PassTrigger::Periodic => "periodic",
            PassTrigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Result of asking for a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(PassReport),
    /// Another pass was running; this request was coalesced into it
    AlreadyRunning,
    /// Automatic trigger while offline; nothing was attempted
    SkippedOffline,
}

/// Read-side aggregation for status displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    pub scenarios: u64,
    pub sessions: u64,
    pub progress: u64,
    /// Mutation queue length
    pub pending_sync: u64,
    /// Completion time of the last successful pass
    pub last_sync: Option<DateTime<Utc>>,
    /// Rows in the abandoned-mutation log
    pub abandoned: u64,
    pub is_syncing: bool,
    pub is_online: bool,
}

struct EngineInner {
    db: Arc<LocalDatabase>,
    queue: MutationQueue,
    remote: Arc<dyn RemoteApi>,
    connectivity: ConnectivitySignal,
    retention: Retention,
    config: SyncConfig,
    pass_flag: PassFlag,
    state: RwLock<SyncState>,
    metrics: RwLock<SyncMetrics>,
}

/// Offline-first sync engine
///
/// Background tasks started by [`SyncEngine::start`] are aborted by
/// [`SyncEngine::stop`] or when the engine is dropped.
pub struct SyncEngine {
    inner: Arc<EngineInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.inner.config)
            .field("phase", &self.inner.pass_flag.phase())
            .field("online", &self.inner.connectivity.is_online())
            .finish()
    }
}

impl SyncEngine {
    /// Build an engine; fails with `SyncError::Config` on an invalid config
    pub fn new(
        db: Arc<LocalDatabase>,
        remote: Arc<dyn RemoteApi>,
        connectivity: ConnectivitySignal,
        config: SyncConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| SyncError::config(e.to_string()))?;

        let queue = MutationQueue::new(db.clone(), RetryPolicy::from_config(&config));
        let retention = Retention::new(db.clone(), config.retention_window());

        Ok(Self {
            inner: Arc::new(EngineInner {
                db,
                queue,
                remote,
                connectivity,
                retention,
                config,
                pass_flag: PassFlag::new(),
                state: RwLock::new(SyncState::default()),
                metrics: RwLock::new(SyncMetrics::new()),
            }),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start background triggers and run the start-up pass
    ///
    /// Spawns the connectivity listener and, when configured, the periodic
    /// scheduler. If the device is online and the queue is not empty a pass
    /// runs before this returns. Calling `start` twice is a no-op.
    pub async fn start(&self) -> Result<()> {
        {
            let mut tasks = self.tasks.lock().await;
            if !tasks.is_empty() {
                tracing::warn!("Sync engine already started");
                return Ok(());
            }

            tasks.push(self.spawn_connectivity_listener());

            if let Some(seconds) = self.inner.config.sync_interval_seconds {
                let inner = self.inner.clone();
                let scheduler = SyncScheduler::from_seconds(seconds);
                tasks.push(scheduler.spawn(move || {
                    let inner = inner.clone();
                    async move {
                        inner.run_logged(PassTrigger::Periodic).await;
                    }
                }));
                tracing::info!(interval_seconds = seconds, "Periodic sync enabled");
            }
        }

        if self.inner.connectivity.is_online() && !self.inner.queue.is_empty().await? {
            self.inner.run_pass(PassTrigger::Startup).await?;
        }

        Ok(())
    }

    /// Abort background tasks; a pass already running finishes on its own
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            handle.abort();
        }
    }

    fn spawn_connectivity_listener(&self) -> JoinHandle<()> {
        let inner = self.inner.clone();
        let mut receiver = inner.connectivity.subscribe();

        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let online = *receiver.borrow_and_update();
                if !online {
                    continue;
                }
                // Each pass gets its own task so a panicking remote cannot
                // take the listener down with it
                let inner = inner.clone();
                tokio::spawn(async move {
                    inner.run_logged(PassTrigger::Reconnect).await;
                });
            }
        })
    }

    /// Run a pass now, ignoring backoff
    ///
    /// Fails with [`SyncError::OfflineForceSync`] while offline, leaving the
    /// queue untouched. Returns [`SyncOutcome::AlreadyRunning`] if a pass is
    /// in flight.
    pub async fn force_sync(&self) -> Result<SyncOutcome> {
        if !self.inner.connectivity.is_online() {
            return Err(SyncError::OfflineForceSync);
        }
        self.inner.run_pass(PassTrigger::Manual).await
    }

    /// Run an automatic pass now, honouring backoff
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        self.inner.run_pass(PassTrigger::Periodic).await
    }

    /// Run retention cleanup outside a pass
    pub async fn run_cleanup(&self) -> Result<CleanupStats> {
        self.inner.retention.run().await
    }

    /// Get current stats
    pub async fn get_stats(&self) -> Result<SyncStats> {
        let db = self.inner.db.get_stats().await?;
        Ok(SyncStats {
            scenarios: db.scenario_count,
            sessions: db.session_count,
            progress: db.progress_count,
            pending_sync: db.pending_operations,
            last_sync: self.inner.db.get_last_sync_time().await?,
            abandoned: db.abandoned_operations,
            is_syncing: self.inner.pass_flag.is_running(),
            is_online: self.inner.connectivity.is_online(),
        })
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.pass_flag.is_running()
    }

    pub fn connectivity(&self) -> &ConnectivitySignal {
        &self.inner.connectivity
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.inner.queue
    }

    pub fn database(&self) -> &LocalDatabase {
        &self.inner.db
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Get current sync state
    pub async fn state(&self) -> SyncState {
        let mut state = self.inner.state.read().await.clone();
        state.phase = self.inner.pass_flag.phase();
        state
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.inner.metrics.read().await.clone()
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        for handle in self.tasks.get_mut().drain(..) {
            handle.abort();
        }
    }
}

impl EngineInner {
    /// Background triggers have nobody to report to
    async fn run_logged(&self, trigger: PassTrigger) {
        if let Err(e) = self.run_pass(trigger).await {
            tracing::error!(%trigger, error = %e, "Sync pass failed");
        }
    }

    async fn run_pass(&self, trigger: PassTrigger) -> Result<SyncOutcome> {
        if !self.connectivity.is_online() {
            tracing::debug!(%trigger, "Offline, skipping sync pass");
            self.metrics.write().await.record_skipped_offline();
            return Ok(SyncOutcome::SkippedOffline);
        }

        let Some(_guard) = self.pass_flag.try_acquire() else {
            tracing::debug!(%trigger, "Sync pass already running");
            self.metrics.write().await.record_coalesced();
            return Ok(SyncOutcome::AlreadyRunning);
        };

        self.metrics.write().await.record_pass_start();
        let started = Instant::now();
        tracing::info!(%trigger, "Sync pass started");

        match self.drain_queue(trigger.respects_backoff()).await {
            Ok(mut report) => {
                if self.config.cleanup_after_sync {
                    match self.retention.run().await {
                        Ok(stats) => report.cleanup = Some(stats),
                        Err(e) => tracing::warn!(error = %e, "Retention cleanup failed"),
                    }
                }

                let finished = Utc::now();
                if let Err(e) = self.db.set_last_sync_time(finished).await {
                    tracing::warn!(error = %e, "Failed to record last sync time");
                }

                let duration = started.elapsed();
                self.metrics
                    .write()
                    .await
                    .record_pass_completed(duration, &report);
                {
                    let mut state = self.state.write().await;
                    state.last_report = Some(report.clone());
                    state.last_pass_finished = Some(finished);
                    state.last_error = None;
                }

                tracing::info!(
                    %trigger,
                    applied = report.applied,
                    retried = report.retried,
                    abandoned = report.abandoned,
                    deferred = report.deferred,
                    duration_ms = duration.as_millis() as u64,
                    "Sync pass finished"
                );
                Ok(SyncOutcome::Completed(report))
            }
            Err(e) => {
                tracing::error!(%trigger, error = %e, "Sync pass aborted");
                self.metrics.write().await.record_pass_failed();
                self.state.write().await.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Walk the queue snapshot once
    ///
    /// Only storage errors escape; remote failures are settled per entry.
    async fn drain_queue(&self, respect_backoff: bool) -> Result<PassReport> {
        let entries = self.queue.drain().await?;
        let now = Utc::now();
        let mut report = PassReport::default();
        let mut held: HashSet<(EntityKind, String)> = HashSet::new();

        for (index, entry) in entries.iter().enumerate() {
            if !self.connectivity.is_online() {
                let remaining = (entries.len() - index) as u32;
                tracing::info!(remaining, "Went offline mid-pass, stopping");
                report.deferred += remaining;
                break;
            }

            let key = (entry.entity_kind, entry.record_id.clone());
            if held.contains(&key) {
                report.deferred += 1;
                continue;
            }
            if respect_backoff && !entry.is_due(now) {
                held.insert(key);
                report.deferred += 1;
                continue;
            }

            match self
                .remote
                .apply(entry.entity_kind, entry.operation, &entry.payload)
                .await
            {
                Ok(()) => {
                    self.queue.complete(entry).await?;
                    report.applied += 1;
                    tracing::debug!(
                        entry_id = %entry.id,
                        kind = %entry.entity_kind,
                        record_id = %entry.record_id,
                        operation = %entry.operation,
                        "Mutation applied"
                    );
                }
                Err(RemoteError::Permanent(message)) => {
                    self.queue.abandon(entry, &message).await?;
                    report.abandoned += 1;
                }
                Err(RemoteError::Transient(message)) => {
                    match self.queue.mark_failed(&entry.id, &message).await? {
                        FailureOutcome::Retained { .. } => {
                            report.retried += 1;
                            held.insert(key);
                        }
                        FailureOutcome::Abandoned { .. } => report.abandoned += 1,
                    }
                }
            }
        }

        Ok(report)
    }
}
