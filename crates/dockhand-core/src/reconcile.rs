//! Post-completion reconciliation
//!
//! When a task reports its terminal stage the service's cached state is
//! stale by definition. The reconciler flips the registry entry back to
//! idle, refetches the service with caching bypassed, stores the fresh
//! snapshot, and tells the rest of the app about it. The registry
//! transition doubles as the exactly-once gate: whichever caller flips
//! Running to Idle performs the reconciliation, everyone else backs off.

use crate::{NotificationCenter, ServiceCache, Signal, SignalBus, TaskRegistry};
use dockhand_api::{ServiceKey, StationBackend};
use std::sync::Arc;

pub struct Reconciler {
    backend: Arc<dyn StationBackend>,
    registry: Arc<TaskRegistry>,
    cache: Arc<ServiceCache>,
    bus: Arc<SignalBus>,
    notifier: Arc<NotificationCenter>,
}

impl Reconciler {
    pub fn new(
        backend: Arc<dyn StationBackend>,
        registry: Arc<TaskRegistry>,
        cache: Arc<ServiceCache>,
        bus: Arc<SignalBus>,
        notifier: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            backend,
            registry,
            cache,
            bus,
            notifier,
        }
    }

    /// Reconcile one finished task. Safe to call more than once for the
    /// same completion; only the first call past the registry gate acts.
    pub async fn on_task_finished(&self, key: &ServiceKey) {
        if !self.registry.invalidate(key) {
            tracing::debug!("Completion for {} already reconciled, skipping", key);
            return;
        }

        self.cache.invalidate(key);
        match self.backend.get_service(key, true).await {
            Ok(service) => {
                self.cache.store_service(service);
                tracing::info!("Refreshed {} after update", key);
            }
            Err(err) => {
                // The next regular fetch will repair the cache; the update
                // itself already finished, so this is not surfaced as an
                // error to the user.
                tracing::warn!("Could not refresh {} after update: {}", key, err);
            }
        }

        self.bus.publish(&Signal::refresh(key.clone()));

        if !self.notifier.mentions(&key.stack_name) {
            self.notifier.success(
                "Update finished",
                format!(
                    "Services in '{}' have been updated successfully",
                    key.stack_name
                ),
            );
        }
    }
}
