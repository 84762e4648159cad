//! Orchestration facade tying the components together
//!
//! [`StackManager`] owns one of everything: registry, signal bus, snapshot
//! cache, notification center and the create/poll/reconcile machinery, all
//! wired to a single backend. Frontends talk to the manager; the manager
//! decides when the cache answers and when the backend is asked.

use crate::{
    CreateOutcome, ErrorWindow, NotificationCenter, PollHandle, Reconciler, Result, ServiceCache,
    SignalBus, TaskCreator, TaskPoller, TaskRegistry,
};
use crate::{AutoUpdater, CoreError};
use dockhand_api::{DockerService, DockerStack, ServiceKey, StationBackend, UpdateOptions};
use dockhand_config::GlobalConfig;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-stack outcomes of one update request.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub created: Vec<(String, Vec<String>)>,
    pub already_running: Vec<String>,
    /// Stacks that disappeared between listing and creating.
    pub gone: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl UpdateReport {
    /// Keys of every service a task was actually created for.
    pub fn started_keys(&self) -> Vec<ServiceKey> {
        self.created
            .iter()
            .flat_map(|(stack, services)| {
                services
                    .iter()
                    .map(move |service| ServiceKey::new(stack, service))
            })
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} stack(s) started, {} already running, {} gone, {} failed",
            self.created.len(),
            self.already_running.len(),
            self.gone.len(),
            self.failed.len()
        )
    }
}

pub struct StackManager {
    backend: Arc<dyn StationBackend>,
    config: GlobalConfig,
    registry: Arc<TaskRegistry>,
    bus: Arc<SignalBus>,
    cache: Arc<ServiceCache>,
    notifier: Arc<NotificationCenter>,
    creator: Arc<TaskCreator>,
    poller: Arc<TaskPoller>,
}

impl StackManager {
    pub fn new(backend: Arc<dyn StationBackend>, config: GlobalConfig) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let bus = Arc::new(SignalBus::new());
        let cache = Arc::new(ServiceCache::new());
        let notifier = Arc::new(NotificationCenter::new(config.notifications.ttl()));
        let errors = Arc::new(ErrorWindow::new());
        let creator = Arc::new(TaskCreator::new(
            backend.clone(),
            registry.clone(),
            bus.clone(),
            notifier.clone(),
            errors.clone(),
        ));
        let reconciler = Arc::new(Reconciler::new(
            backend.clone(),
            registry.clone(),
            cache.clone(),
            bus.clone(),
            notifier.clone(),
        ));
        let poller = Arc::new(TaskPoller::new(
            backend.clone(),
            registry.clone(),
            notifier.clone(),
            reconciler,
            errors,
            config.updates.poll_interval(),
        ));
        Self {
            backend,
            config,
            registry,
            bus,
            cache,
            notifier,
            creator,
            poller,
        }
    }

    /// The stack list, served from the snapshot cache when possible.
    ///
    /// `force_refresh` and a pending invalidation both bypass the backend's
    /// cache as well; a successful fetch clears the invalidation.
    pub async fn list_stacks(&self, force_refresh: bool) -> Result<Vec<DockerStack>> {
        let invalidated = self.cache.is_stacks_invalidated();
        if !force_refresh && !invalidated {
            if let Some(stacks) = self.cache.stacks() {
                return Ok(stacks);
            }
        }
        let stacks = self
            .backend
            .list_stacks(force_refresh || invalidated)
            .await?;
        self.cache.store_stacks(stacks.clone());
        Ok(stacks)
    }

    pub async fn get_stack(&self, name: &str) -> Result<DockerStack> {
        self.backend.get_stack(name).await.map_err(|err| {
            if err.is_not_found() {
                CoreError::StackNotFound(name.to_string())
            } else {
                err.into()
            }
        })
    }

    /// One service, freshly fetched when its cache entry was invalidated.
    pub async fn get_service(&self, key: &ServiceKey) -> Result<DockerService> {
        let invalidated = self.cache.is_invalidated(key);
        if !invalidated {
            if let Some(cached) = self.cache.service(key) {
                return Ok(cached.service);
            }
        }
        let service = self
            .backend
            .get_service(key, invalidated)
            .await
            .map_err(|err| {
                if err.is_not_found() {
                    CoreError::ServiceNotFound(key.to_string())
                } else {
                    CoreError::from(err)
                }
            })?;
        self.cache.store_service(service.clone());
        Ok(service)
    }

    /// Start one update task per stack in the selection. Failures are
    /// collected per stack instead of aborting the rest.
    pub async fn update_services(
        &self,
        selection: &BTreeMap<String, Vec<String>>,
        options: &UpdateOptions,
    ) -> UpdateReport {
        let mut report = UpdateReport::default();
        for (stack_name, services) in selection {
            match self.creator.create(stack_name, services, options).await {
                Ok(CreateOutcome::Created) => {
                    report.created.push((stack_name.clone(), services.clone()))
                }
                Ok(CreateOutcome::AlreadyRunning) => {
                    report.already_running.push(stack_name.clone())
                }
                Ok(CreateOutcome::BackendGone) => report.gone.push(stack_name.clone()),
                Err(err) => report.failed.push((stack_name.clone(), err.to_string())),
            }
        }
        report
    }

    /// Watch already-created tasks.
    pub fn watch(&self, keys: Vec<ServiceKey>) -> PollHandle {
        self.poller.watch(keys)
    }

    /// Update options as configured by the user.
    pub fn update_options(&self) -> UpdateOptions {
        UpdateOptions {
            infer_envfile: self.config.updates.infer_envfile,
            prune_images: self.config.updates.prune_images,
            restart_containers: self.config.updates.restart_containers,
        }
    }

    /// A sweeper sharing this manager's creator, poller and registry.
    pub fn auto_updater(&self) -> AutoUpdater {
        AutoUpdater::new(
            self.backend.clone(),
            self.creator.clone(),
            self.poller.clone(),
            self.config.auto_update.clone(),
            self.update_options(),
        )
    }

    pub fn invalidate_service(&self, key: &ServiceKey) {
        self.cache.invalidate(key);
    }

    pub fn invalidate_stacks(&self) {
        self.cache.invalidate_stacks();
    }

    pub fn backend(&self) -> &Arc<dyn StationBackend> {
        &self.backend
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<SignalBus> {
        &self.bus
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{mock_service, mock_stack, MockBackend};
    use dockhand_api::ApiError;

    fn manager() -> (Arc<MockBackend>, StackManager) {
        let backend = Arc::new(MockBackend::new());
        let manager = StackManager::new(backend.clone(), GlobalConfig::default());
        (backend, manager)
    }

    fn key() -> ServiceKey {
        ServiceKey::new("web", "app")
    }

    #[tokio::test]
    async fn test_list_stacks_serves_cache_until_forced() {
        let (backend, manager) = manager();
        backend.put_stacks(vec![mock_stack(
            "web",
            vec![mock_service("web", "app", false)],
        )]);

        manager.list_stacks(false).await.unwrap();
        manager.list_stacks(false).await.unwrap();
        assert_eq!(backend.list_calls(), vec![false], "second read hit the cache");

        manager.list_stacks(true).await.unwrap();
        assert_eq!(backend.list_calls(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_stack_invalidation_bypasses_backend_cache_once() {
        let (backend, manager) = manager();
        backend.put_stacks(vec![mock_stack(
            "web",
            vec![mock_service("web", "app", false)],
        )]);

        manager.list_stacks(false).await.unwrap();
        manager.invalidate_stacks();
        manager.list_stacks(false).await.unwrap();
        manager.list_stacks(false).await.unwrap();

        // Exactly the post-invalidation fetch asked for fresh data.
        assert_eq!(backend.list_calls(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_get_service_refetches_after_invalidation() {
        let (backend, manager) = manager();
        backend.put_stacks(vec![mock_stack(
            "web",
            vec![mock_service("web", "app", false)],
        )]);

        manager.list_stacks(false).await.unwrap();
        let cached = manager.get_service(&key()).await.unwrap();
        assert_eq!(cached.name, "web-app-1");
        assert_eq!(
            backend.service_refetches(&key()),
            0,
            "list populated the cache, no per-service fetch needed"
        );

        manager.invalidate_service(&key());
        manager.get_service(&key()).await.unwrap();
        assert_eq!(backend.service_refetches(&key()), 1);
    }

    #[tokio::test]
    async fn test_update_services_collects_per_stack_outcomes() {
        let (backend, manager) = manager();
        manager.registry().begin("busy", &["app".to_string()]);

        let mut selection = BTreeMap::new();
        selection.insert("busy".to_string(), vec!["app".to_string()]);
        selection.insert("web".to_string(), vec!["app".to_string()]);
        let report = manager
            .update_services(&selection, &UpdateOptions::default())
            .await;

        assert_eq!(
            report.created,
            vec![("web".to_string(), vec!["app".to_string()])]
        );
        assert_eq!(report.already_running, vec!["busy".to_string()]);
        assert!(report.is_success());
        assert_eq!(report.started_keys(), vec![key()]);
        assert_eq!(backend.batch_requests(), vec![vec!["web/app".to_string()]]);
    }

    #[tokio::test]
    async fn test_missing_stack_maps_to_domain_error() {
        let (backend, manager) = manager();
        backend.put_stacks(vec![]);

        let err = manager.get_stack("ghost").await.unwrap_err();
        assert!(matches!(err, CoreError::StackNotFound(name) if name == "ghost"));

        backend.fail_services(ApiError::Status {
            status: 404,
            message: "Service not found".to_string(),
        });
        let err = manager.get_service(&key()).await.unwrap_err();
        assert!(matches!(err, CoreError::ServiceNotFound(_)));
    }
}
