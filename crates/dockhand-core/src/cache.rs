//! Cached stack and service snapshots
//!
//! Mirrors the dashboard's query cache: a stack-list response cross-populates
//! the per-service entries, a refetched service is written back into the
//! list snapshot, and an invalidated entry causes exactly the next fetch for
//! that key to request `no_cache` from the backend. The flag clears when a
//! fresh snapshot is stored.

use chrono::{DateTime, Utc};
use dockhand_api::{DockerService, DockerStack, ServiceKey};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A service snapshot plus when it was fetched.
#[derive(Debug, Clone)]
pub struct CachedService {
    pub service: DockerService,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Default)]
struct CacheInner {
    stacks: Option<Vec<DockerStack>>,
    stacks_fetched_at: Option<DateTime<Utc>>,
    stacks_invalidated: bool,
    services: HashMap<ServiceKey, CachedService>,
    invalidated: HashSet<ServiceKey>,
}

/// Shared snapshot store for backend data.
#[derive(Default)]
pub struct ServiceCache {
    inner: Mutex<CacheInner>,
}

impl ServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a stack-list response and cross-populate per-service entries.
    pub fn store_stacks(&self, stacks: Vec<DockerStack>) {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();

        for stack in &stacks {
            for service in &stack.services {
                if let Some(key) = service.key() {
                    inner.invalidated.remove(&key);
                    inner.services.insert(
                        key,
                        CachedService {
                            service: service.clone(),
                            fetched_at: now,
                        },
                    );
                }
            }
        }

        inner.stacks = Some(stacks);
        inner.stacks_fetched_at = Some(now);
        inner.stacks_invalidated = false;
    }

    /// Store a single service snapshot, clearing its invalidation flag and
    /// updating the copy held inside the list snapshot.
    pub fn store_service(&self, service: DockerService) {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();

        let Some(key) = service.key() else {
            return;
        };

        if let Some(stacks) = inner.stacks.as_mut() {
            for stack in stacks.iter_mut().filter(|s| s.name == key.stack_name) {
                for slot in stack.services.iter_mut() {
                    if slot.key().as_ref() == Some(&key) {
                        *slot = service.clone();
                    }
                }
                stack.has_updates = stack.services.iter().any(|s| s.has_updates);
            }
        }

        inner.invalidated.remove(&key);
        inner.services.insert(
            key,
            CachedService {
                service,
                fetched_at: now,
            },
        );
    }

    /// Cached list snapshot, if any.
    pub fn stacks(&self) -> Option<Vec<DockerStack>> {
        self.inner.lock().unwrap().stacks.clone()
    }

    pub fn stacks_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().unwrap().stacks_fetched_at
    }

    /// Cached snapshot for one service, if any.
    pub fn service(&self, key: &ServiceKey) -> Option<CachedService> {
        self.inner.lock().unwrap().services.get(key).cloned()
    }

    /// Mark one service stale. The next fetch for it should bypass the
    /// backend cache.
    pub fn invalidate(&self, key: &ServiceKey) {
        self.inner.lock().unwrap().invalidated.insert(key.clone());
    }

    /// Mark the list snapshot stale.
    pub fn invalidate_stacks(&self) {
        self.inner.lock().unwrap().stacks_invalidated = true;
    }

    pub fn is_invalidated(&self, key: &ServiceKey) -> bool {
        self.inner.lock().unwrap().invalidated.contains(key)
    }

    pub fn is_stacks_invalidated(&self) -> bool {
        self.inner.lock().unwrap().stacks_invalidated
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = CacheInner::default();
    }
}
