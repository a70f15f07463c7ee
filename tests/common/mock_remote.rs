//! Scriptable in-process remote
//!
//! Records every call and lets a test decide, per record id, whether the
//! call succeeds, fails transiently, is rejected, blocks, or panics.

use async_trait::async_trait;
use practice_sync::remote::{RemoteApi, RemoteError};
use practice_sync::shared::{EntityKind, Operation};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One observed remote call
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub entity_kind: EntityKind,
    pub operation: Operation,
    pub record_id: String,
    pub payload: serde_json::Value,
}

/// Handles for a blocked call: wait on `entered`, then notify `release`
pub struct CallGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct MockRemote {
    calls: Mutex<Vec<RemoteCall>>,
    transient_failures: Mutex<HashMap<String, u32>>,
    rejected: Mutex<HashSet<String>>,
    panics: Mutex<HashSet<String>>,
    gate: Mutex<Option<CallGate>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `times` calls for `record_id` with a transient error
    pub fn fail_transient(&self, record_id: &str, times: u32) {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(record_id.to_string(), times);
    }

    /// Reject every call for `record_id` permanently
    pub fn reject(&self, record_id: &str) {
        self.rejected.lock().unwrap().insert(record_id.to_string());
    }

    pub fn panic_on(&self, record_id: &str) {
        self.panics.lock().unwrap().insert(record_id.to_string());
    }

    pub fn clear_panics(&self) {
        self.panics.lock().unwrap().clear();
    }

    /// Block the next call until the returned gate is released
    pub fn block_next_call(&self) -> CallGate {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(CallGate {
            entered: entered.clone(),
            release: release.clone(),
        });
        CallGate { entered, release }
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// `(operation, record_id)` of every call, in order
    pub fn call_log(&self) -> Vec<(Operation, String)> {
        self.calls()
            .into_iter()
            .map(|call| (call.operation, call.record_id))
            .collect()
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn apply(
        &self,
        entity_kind: EntityKind,
        operation: Operation,
        payload: &serde_json::Value,
    ) -> Result<(), RemoteError> {
        let record_id = payload
            .get("id")
            .and_then(|id| id.as_str())
            .unwrap_or_default()
            .to_string();

        self.calls.lock().unwrap().push(RemoteCall {
            entity_kind,
            operation,
            record_id: record_id.clone(),
            payload: payload.clone(),
        });

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.panics.lock().unwrap().contains(&record_id) {
            panic!("mock remote panicked on {}", record_id);
        }

        if self.rejected.lock().unwrap().contains(&record_id) {
            return Err(RemoteError::Permanent(format!("422 rejected {}", record_id)));
        }

        let mut failures = self.transient_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&record_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Transient("503 Service Unavailable".to_string()));
            }
        }

        Ok(())
    }
}
