//! Unattended update sweeps
//!
//! The auto-updater periodically lists all stacks with caching bypassed,
//! picks the services whose updates have matured, and runs one batch update
//! per stack, watching each to completion. Stacks whose name contains one of
//! the configured ignore keywords are never touched. Concurrent stack
//! updates are bounded by `max_concurrent`.

use crate::{CreateOutcome, Result, TaskCreator, TaskPoller};
use chrono::Utc;
use dockhand_api::{parse_interval, ServiceKey, StationBackend, UpdateOptions};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use dockhand_config::AutoUpdateConfig;

/// One stack the sweep updated.
#[derive(Debug)]
pub struct StackUpdate {
    pub stack_name: String,
    pub services: Vec<String>,
    /// How many of the services reached the terminal stage.
    pub finished: usize,
}

/// What a single sweep did.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Services found with a matured update.
    pub candidates: usize,
    pub updated: Vec<StackUpdate>,
    /// Stacks left alone because a task was already active.
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl SweepReport {
    pub fn summary(&self) -> String {
        format!(
            "{} candidate service(s), {} stack(s) updated, {} skipped, {} failed",
            self.candidates,
            self.updated.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}

pub struct AutoUpdater {
    backend: Arc<dyn StationBackend>,
    creator: Arc<TaskCreator>,
    poller: Arc<TaskPoller>,
    config: AutoUpdateConfig,
    options: UpdateOptions,
}

impl AutoUpdater {
    pub fn new(
        backend: Arc<dyn StationBackend>,
        creator: Arc<TaskCreator>,
        poller: Arc<TaskPoller>,
        config: AutoUpdateConfig,
        options: UpdateOptions,
    ) -> Self {
        Self {
            backend,
            creator,
            poller,
            config,
            options,
        }
    }

    /// One full sweep over all stacks. Maturity threshold and ignore
    /// keywords come from the backend's server settings.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let settings = self.backend.get_settings().await?;
        let mature_after = parse_interval(&settings.server.time_until_update_is_mature)
            .unwrap_or(Duration::ZERO);
        let ignore: Vec<String> = settings
            .server
            .ignore_compose_stack_name_keywords
            .iter()
            .map(|keyword| keyword.to_lowercase())
            .collect();

        let stacks = self.backend.list_stacks(true).await?;
        let now = Utc::now();
        let mut report = SweepReport::default();
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();

        for stack in &stacks {
            let lowered = stack.name.to_lowercase();
            if ignore.iter().any(|keyword| lowered.contains(keyword)) {
                tracing::debug!("Skipping stack '{}', matched ignore keyword", stack.name);
                continue;
            }
            let due: Vec<String> = stack
                .services
                .iter()
                .filter(|service| {
                    service.has_updates && service.image.is_matured(now, mature_after)
                })
                .filter_map(|service| service.service_name.clone())
                .collect();
            if !due.is_empty() {
                report.candidates += due.len();
                groups.push((stack.name.clone(), due));
            }
        }

        let outcomes: Vec<StackOutcome> = stream::iter(groups)
            .map(|(stack_name, services)| self.update_stack(stack_name, services))
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                StackOutcome::Updated(update) => report.updated.push(update),
                StackOutcome::Skipped(stack_name) => report.skipped.push(stack_name),
                StackOutcome::Failed(stack_name, reason) => {
                    report.failed.push((stack_name, reason))
                }
            }
        }
        Ok(report)
    }

    async fn update_stack(&self, stack_name: String, services: Vec<String>) -> StackOutcome {
        match self
            .creator
            .create(&stack_name, &services, &self.options)
            .await
        {
            Ok(CreateOutcome::Created) => {
                let keys = services
                    .iter()
                    .map(|service| ServiceKey::new(&stack_name, service))
                    .collect();
                let outcomes = self.poller.watch(keys).join().await;
                let finished = outcomes.iter().filter(|o| o.is_finished()).count();
                StackOutcome::Updated(StackUpdate {
                    stack_name,
                    services,
                    finished,
                })
            }
            Ok(CreateOutcome::AlreadyRunning) | Ok(CreateOutcome::BackendGone) => {
                StackOutcome::Skipped(stack_name)
            }
            Err(err) => StackOutcome::Failed(stack_name, err.to_string()),
        }
    }

    /// Run sweeps forever, one every `interval`, starting immediately.
    pub fn spawn(self: Arc<Self>) -> AutoHandle {
        let stop = Arc::new(Notify::new());
        let stop_signal = stop.clone();
        let interval = self.config.interval();
        let task = tokio::spawn(async move {
            loop {
                match self.run_once().await {
                    Ok(report) => tracing::info!("Auto-update sweep done: {}", report.summary()),
                    Err(err) => tracing::warn!("Auto-update sweep failed: {}", err),
                }
                tokio::select! {
                    _ = stop_signal.notified() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });
        AutoHandle { stop, task }
    }
}

enum StackOutcome {
    Updated(StackUpdate),
    Skipped(String),
    Failed(String, String),
}

/// Running auto-update loop. Aborted when dropped.
pub struct AutoHandle {
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

impl AutoHandle {
    /// Stop after the current sweep instead of sleeping until the next one.
    pub fn cancel(&self) {
        self.stop.notify_one();
    }

    pub async fn join(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for AutoHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
