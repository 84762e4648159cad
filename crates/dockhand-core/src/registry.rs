//! Per-service task state table
//!
//! Tracks, per service key, whether an update task is currently active and
//! the highest progress offset observed so far. All check-then-act sequences
//! (claiming a batch, the invalidate gate) happen under a single lock
//! acquisition, so concurrent creators cannot both observe "idle" and both
//! send a request.

use dockhand_api::ServiceKey;
use std::collections::HashMap;
use std::sync::Mutex;

/// Whether the last create call for a key is still considered fresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskStatus {
    #[default]
    Idle,
    Running,
}

impl TaskStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// State held per service key.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskEntry {
    pub status: TaskStatus,
    pub last_offset: usize,
}

/// Shared task state, one entry per service key.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    entries: Mutex<HashMap<ServiceKey, TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an update task is currently active for this key.
    pub fn is_running(&self, key: &ServiceKey) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|entry| entry.status.is_running())
            .unwrap_or(false)
    }

    /// Atomically claim a batch of services for one task.
    ///
    /// Returns `false` and changes nothing if *any* of the named services
    /// already has an active task; otherwise marks every one of them running
    /// (offset reset to zero) and returns `true`.
    pub fn begin(&self, stack_name: &str, service_names: &[String]) -> bool {
        let mut entries = self.entries.lock().unwrap();

        let busy = service_names.iter().any(|service| {
            let key = ServiceKey::new(stack_name, service.as_str());
            entries
                .get(&key)
                .map(|entry| entry.status.is_running())
                .unwrap_or(false)
        });
        if busy {
            return false;
        }

        for service in service_names {
            let key = ServiceKey::new(stack_name, service.as_str());
            entries.insert(
                key,
                TaskEntry {
                    status: TaskStatus::Running,
                    last_offset: 0,
                },
            );
        }
        true
    }

    /// Mark the entry stale, allowing a new task for this key.
    ///
    /// Returns `true` only on the first `Running -> Idle` transition; the
    /// reconciler uses this as its exactly-once gate.
    pub fn invalidate(&self, key: &ServiceKey) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(entry) if entry.status.is_running() => {
                entry.status = TaskStatus::Idle;
                true
            }
            _ => false,
        }
    }

    /// Roll a failed batch back so retry is possible.
    pub fn reset(&self, stack_name: &str, service_names: &[String]) {
        let mut entries = self.entries.lock().unwrap();
        for service in service_names {
            let key = ServiceKey::new(stack_name, service.as_str());
            if let Some(entry) = entries.get_mut(&key) {
                entry.status = TaskStatus::Idle;
            }
        }
    }

    /// Record the highest offset a poller has observed for this key.
    ///
    /// Offsets never move backwards; a stale report is ignored.
    pub fn record_offset(&self, key: &ServiceKey, offset: usize) {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.clone()).or_default();
        if offset > entry.last_offset {
            entry.last_offset = offset;
        }
    }

    /// Highest offset observed for this key (zero if unknown).
    pub fn last_offset(&self, key: &ServiceKey) -> usize {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|entry| entry.last_offset)
            .unwrap_or(0)
    }
}
