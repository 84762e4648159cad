//! Background polling of active update tasks
//!
//! Each watched service gets its own polling loop that asks the backend for
//! progress messages strictly after what it already holds. A [`PollHandle`]
//! bundles the loops: it streams progress events, can cancel the whole
//! watch, and yields one [`PollOutcome`] per service on join.

use crate::{MessageHistory, NotificationCenter, Reconciler, TaskRegistry};
use dockhand_api::{ApiError, ProgressMessage, ServiceKey, StationBackend};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Progress surfaced while a watch is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// New messages were appended to the service's history.
    Progress {
        key: ServiceKey,
        messages: Vec<ProgressMessage>,
    },
    /// The task reached its terminal stage.
    Finished { key: ServiceKey },
    /// Polling stopped for this service on an unexpected error.
    Failed { key: ServiceKey, error: ApiError },
}

/// How a single service's polling loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Finished,
    Failed(ApiError),
    Cancelled,
}

/// Final state of one watched service.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub key: ServiceKey,
    pub history: MessageHistory,
    pub status: PollStatus,
}

impl PollOutcome {
    pub fn is_finished(&self) -> bool {
        self.status == PollStatus::Finished
    }
}

pub struct TaskPoller {
    backend: Arc<dyn StationBackend>,
    registry: Arc<TaskRegistry>,
    notifier: Arc<NotificationCenter>,
    reconciler: Arc<Reconciler>,
    errors: Arc<ErrorWindow>,
    interval: Duration,
}

impl TaskPoller {
    pub fn new(
        backend: Arc<dyn StationBackend>,
        registry: Arc<TaskRegistry>,
        notifier: Arc<NotificationCenter>,
        reconciler: Arc<Reconciler>,
        errors: Arc<ErrorWindow>,
        interval: Duration,
    ) -> Self {
        Self {
            backend,
            registry,
            notifier,
            reconciler,
            errors,
            interval,
        }
    }

    /// Start one polling loop per key and return the combined handle.
    ///
    /// Every history starts with a locally appended `Connecting` message so
    /// callers have something to show before the first response arrives.
    pub fn watch(&self, keys: Vec<ServiceKey>) -> PollHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let tasks = keys
            .into_iter()
            .map(|key| {
                let worker = PollWorker {
                    backend: self.backend.clone(),
                    registry: self.registry.clone(),
                    notifier: self.notifier.clone(),
                    reconciler: self.reconciler.clone(),
                    errors: self.errors.clone(),
                    interval: self.interval,
                    cancelled: cancelled.clone(),
                    events: tx.clone(),
                    key: key.clone(),
                };
                (key, tokio::spawn(worker.run()))
            })
            .collect();
        PollHandle {
            events: Some(rx),
            tasks,
            cancelled,
        }
    }
}

/// Running watch over one or more services. Aborts its loops when dropped.
pub struct PollHandle {
    events: Option<mpsc::UnboundedReceiver<PollEvent>>,
    tasks: Vec<(ServiceKey, JoinHandle<PollOutcome>)>,
    cancelled: Arc<AtomicBool>,
}

impl PollHandle {
    /// Take the event stream. Yields `None` after the first call.
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<PollEvent>> {
        self.events.take()
    }

    /// Ask every loop to stop at its next tick. The backend tasks keep
    /// running server-side; only the watching stops.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Wait for all loops and collect their outcomes.
    pub async fn join(mut self) -> Vec<PollOutcome> {
        let tasks = std::mem::take(&mut self.tasks);
        let mut outcomes = Vec::with_capacity(tasks.len());
        for (key, task) in tasks {
            match task.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => outcomes.push(PollOutcome {
                    key,
                    history: MessageHistory::new(),
                    status: PollStatus::Cancelled,
                }),
            }
        }
        outcomes
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        for (_, task) in &self.tasks {
            task.abort();
        }
    }
}

struct PollWorker {
    backend: Arc<dyn StationBackend>,
    registry: Arc<TaskRegistry>,
    notifier: Arc<NotificationCenter>,
    reconciler: Arc<Reconciler>,
    errors: Arc<ErrorWindow>,
    interval: Duration,
    cancelled: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<PollEvent>,
    key: ServiceKey,
}

impl PollWorker {
    async fn run(mut self) -> PollOutcome {
        let mut history = MessageHistory::new();
        history.push_local(ProgressMessage::connecting());
        self.emit(PollEvent::Progress {
            key: self.key.clone(),
            messages: vec![ProgressMessage::connecting()],
        });

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.cancelled.load(Ordering::SeqCst) {
                return PollOutcome {
                    key: self.key.clone(),
                    history,
                    status: PollStatus::Cancelled,
                };
            }

            let offset = history.next_offset();
            match self.backend.poll_task(&self.key, offset).await {
                Ok(batch) => {
                    let added = history.append_since(offset, batch);
                    self.registry.record_offset(&self.key, history.next_offset());
                    if added > 0 {
                        let messages = history.messages()[history.len() - added..].to_vec();
                        self.emit(PollEvent::Progress {
                            key: self.key.clone(),
                            messages,
                        });
                    }
                    if history.is_finished() {
                        self.reconciler.on_task_finished(&self.key).await;
                        self.emit(PollEvent::Finished {
                            key: self.key.clone(),
                        });
                        return PollOutcome {
                            key: self.key.clone(),
                            history,
                            status: PollStatus::Finished,
                        };
                    }
                }
                Err(err) if err.is_not_found() => {
                    // Task not registered backend-side yet, or already gone.
                    // Expected while the update is starting up; keep polling.
                    tracing::debug!("No task data for {} yet (404)", self.key);
                }
                Err(err) => {
                    if self.errors.first_error(&self.key.stack_name) {
                        self.notifier.error(
                            "Update polling failed",
                            format!(
                                "Lost progress updates for stack '{}': {}",
                                self.key.stack_name, err
                            ),
                        );
                    } else {
                        tracing::debug!(
                            "Polling {} failed after an earlier error in the stack: {}",
                            self.key,
                            err
                        );
                    }
                    self.registry.invalidate(&self.key);
                    self.emit(PollEvent::Failed {
                        key: self.key.clone(),
                        error: err.clone(),
                    });
                    return PollOutcome {
                        key: self.key.clone(),
                        history,
                        status: PollStatus::Failed(err),
                    };
                }
            }
        }
    }

    fn emit(&mut self, event: PollEvent) {
        // Receiver may have been dropped by a caller that only joins.
        let _ = self.events.send(event);
    }
}

/// Tracks which stacks already surfaced a polling error, so parallel pollers
/// for services of the same stack produce one notification instead of one
/// per service. Creating a new task for the stack reopens the window.
#[derive(Debug, Default)]
pub struct ErrorWindow {
    stacks: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl ErrorWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this is the first error for the stack since the
    /// window was last cleared.
    pub fn first_error(&self, stack_name: &str) -> bool {
        self.stacks.lock().unwrap().insert(stack_name.to_string())
    }

    pub fn clear(&self, stack_name: &str) {
        self.stacks.lock().unwrap().remove(stack_name);
    }
}
