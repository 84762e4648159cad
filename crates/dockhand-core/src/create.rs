//! Update-task creation with duplicate suppression
//!
//! One creator instance is shared by every caller that can start updates
//! (single-service actions, the batch path, the auto-updater). The registry
//! claim happens before the network call, so two callers racing on the same
//! services produce exactly one request.

use crate::{CoreError, ErrorWindow, NotificationCenter, Result, Signal, SignalBus, TaskRegistry};
use dockhand_api::{BatchUpdateRequest, StationBackend, UpdateOptions};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of a create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A batch task was created and the task-created signal published.
    Created,
    /// A task covering at least one of the services is still active; no
    /// request was sent. Not an error.
    AlreadyRunning,
    /// The backend answered 404: the stack vanished between listing and
    /// creating. Expected race, silently ignored.
    BackendGone,
}

pub struct TaskCreator {
    backend: Arc<dyn StationBackend>,
    registry: Arc<TaskRegistry>,
    bus: Arc<SignalBus>,
    notifier: Arc<NotificationCenter>,
    errors: Arc<ErrorWindow>,
}

impl TaskCreator {
    pub fn new(
        backend: Arc<dyn StationBackend>,
        registry: Arc<TaskRegistry>,
        bus: Arc<SignalBus>,
        notifier: Arc<NotificationCenter>,
        errors: Arc<ErrorWindow>,
    ) -> Self {
        Self {
            backend,
            registry,
            bus,
            notifier,
            errors,
        }
    }

    /// Create one update task covering `service_names` in `stack_name`.
    ///
    /// Duplicate names are removed before sending. If any named service
    /// already has an active task the call is a silent no-op. On failure the
    /// registry is rolled back so the caller can retry; failures other than
    /// 404 also post one error notification.
    pub async fn create(
        &self,
        stack_name: &str,
        service_names: &[String],
        options: &UpdateOptions,
    ) -> Result<CreateOutcome> {
        if stack_name.is_empty() {
            return Err(CoreError::InvalidServiceKey(
                "stack name must not be empty".to_string(),
            ));
        }
        if service_names.is_empty() {
            return Err(CoreError::EmptyServiceList(stack_name.to_string()));
        }

        let mut seen = HashSet::new();
        let services: Vec<String> = service_names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();

        if !self.registry.begin(stack_name, &services) {
            tracing::debug!(
                "Task already active for '{}' ({}), skipping create",
                stack_name,
                services.join(", ")
            );
            return Ok(CreateOutcome::AlreadyRunning);
        }

        let request = BatchUpdateRequest::for_stack(stack_name, &services, *options);
        match self.backend.create_batch_task(&request).await {
            Ok(()) => {
                self.errors.clear(stack_name);
                tracing::info!(
                    "Created update task for {} service(s) in '{}'",
                    services.len(),
                    stack_name
                );
                self.bus
                    .publish(&Signal::task_created(stack_name, services));
                Ok(CreateOutcome::Created)
            }
            Err(err) if err.is_not_found() => {
                self.registry.reset(stack_name, &services);
                tracing::debug!("Create for '{}' returned 404, ignoring: {}", stack_name, err);
                Ok(CreateOutcome::BackendGone)
            }
            Err(err) => {
                self.registry.reset(stack_name, &services);
                self.notifier.error(
                    "Update failed",
                    format!("Could not start update for '{}': {}", stack_name, err),
                );
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockBackend;
    use crate::Signal;
    use dockhand_api::{ApiError, ServiceKey};
    use std::time::Duration;

    struct Fixture {
        backend: Arc<MockBackend>,
        registry: Arc<TaskRegistry>,
        bus: Arc<SignalBus>,
        notifier: Arc<NotificationCenter>,
        creator: TaskCreator,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MockBackend::new());
        let registry = Arc::new(TaskRegistry::new());
        let bus = Arc::new(SignalBus::new());
        let notifier = Arc::new(NotificationCenter::new(Duration::from_secs(60)));
        let creator = TaskCreator::new(
            backend.clone(),
            registry.clone(),
            bus.clone(),
            notifier.clone(),
            Arc::new(ErrorWindow::new()),
        );
        Fixture {
            backend,
            registry,
            bus,
            notifier,
            creator,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_posts_once_and_publishes_signal() {
        let f = fixture();
        let (_sub, mut rx) = f.bus.subscribe_channel();

        let outcome = f
            .creator
            .create("web", &names(&["app"]), &UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome, CreateOutcome::Created);
        assert_eq!(f.backend.batch_requests(), vec![vec!["web/app".to_string()]]);
        assert!(f.registry.is_running(&ServiceKey::new("web", "app")));
        assert_eq!(
            rx.try_recv().unwrap(),
            Signal::task_created("web", names(&["app"]))
        );
    }

    #[tokio::test]
    async fn test_duplicate_create_is_suppressed() {
        let f = fixture();

        let first = f
            .creator
            .create("web", &names(&["app"]), &UpdateOptions::default())
            .await
            .unwrap();
        let second = f
            .creator
            .create("web", &names(&["app", "db"]), &UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!(first, CreateOutcome::Created);
        assert_eq!(second, CreateOutcome::AlreadyRunning);
        assert_eq!(
            f.backend.batch_requests().len(),
            1,
            "overlapping create must not reach the backend"
        );
    }

    #[tokio::test]
    async fn test_service_names_are_deduplicated() {
        let f = fixture();

        f.creator
            .create(
                "web",
                &names(&["app", "app", "db"]),
                &UpdateOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            f.backend.batch_requests(),
            vec![vec!["web/app".to_string(), "web/db".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_not_found_is_silent() {
        let f = fixture();
        f.backend.fail_batch(ApiError::Status {
            status: 404,
            message: "Stack not found".to_string(),
        });

        let outcome = f
            .creator
            .create("web", &names(&["app"]), &UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome, CreateOutcome::BackendGone);
        assert!(f.notifier.active().is_empty(), "404 never notifies");
        assert!(
            !f.registry.is_running(&ServiceKey::new("web", "app")),
            "registry rolled back"
        );
    }

    #[tokio::test]
    async fn test_failure_notifies_and_allows_retry() {
        let f = fixture();
        f.backend.fail_batch(ApiError::Connection("refused".to_string()));

        let err = f
            .creator
            .create("web", &names(&["app"]), &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Api(_)));

        let active = f.notifier.active();
        assert_eq!(active.len(), 1);
        assert!(active[0].message.contains("web"));

        // Registry was rolled back; a retry reaches the backend again
        f.backend.restore_batch();
        let outcome = f
            .creator
            .create("web", &names(&["app"]), &UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Created);
        assert_eq!(f.backend.batch_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_locally() {
        let f = fixture();

        let err = f
            .creator
            .create("web", &[], &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::EmptyServiceList(_)));

        let err = f
            .creator
            .create("", &names(&["app"]), &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidServiceKey(_)));

        assert!(f.backend.batch_requests().is_empty());
    }
}
