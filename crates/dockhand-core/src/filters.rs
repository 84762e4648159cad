//! Client-side filtering, ordering and selection of the stack list

use chrono::{DateTime, Utc};
use dockhand_api::{DockerService, DockerStack, ServiceKey};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// Active view filters plus the set of services marked for update.
#[derive(Debug, Default, Clone)]
pub struct FilterState {
    /// Case-insensitive substring matched against stack and service names.
    pub search: String,
    /// Only show services with an update available.
    pub updates_only: bool,
    /// Additionally require the update to have matured.
    pub matured_only: bool,
    selected: HashSet<ServiceKey>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the selection state of a service; returns whether it is now
    /// selected.
    pub fn toggle(&mut self, key: ServiceKey) -> bool {
        if self.selected.remove(&key) {
            false
        } else {
            self.selected.insert(key);
            true
        }
    }

    pub fn select(&mut self, key: ServiceKey) {
        self.selected.insert(key);
    }

    pub fn is_selected(&self, key: &ServiceKey) -> bool {
        self.selected.contains(key)
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn selection_len(&self) -> usize {
        self.selected.len()
    }

    /// Selection grouped per stack, both levels sorted, ready to be turned
    /// into one batch request per stack.
    pub fn selection_by_stack(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in &self.selected {
            groups
                .entry(key.stack_name.clone())
                .or_default()
                .push(key.service_name.clone());
        }
        for services in groups.values_mut() {
            services.sort();
        }
        groups
    }

    fn matches(
        &self,
        stack_name: &str,
        service: &DockerService,
        now: DateTime<Utc>,
        mature_after: Duration,
    ) -> bool {
        if !self.search.is_empty() {
            let needle = self.search.to_lowercase();
            let in_stack = stack_name.to_lowercase().contains(&needle);
            let in_service = service.name.to_lowercase().contains(&needle)
                || service
                    .service_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle));
            if !in_stack && !in_service {
                return false;
            }
        }
        if self.updates_only && !service.has_updates {
            return false;
        }
        if self.matured_only
            && !(service.has_updates && service.image.is_matured(now, mature_after))
        {
            return false;
        }
        true
    }

    /// Apply the filters to a stack list snapshot. Services are ordered
    /// within each stack and stacks without a single matching service are
    /// dropped entirely.
    pub fn apply(
        &self,
        stacks: &[DockerStack],
        now: DateTime<Utc>,
        mature_after: Duration,
    ) -> Vec<DockerStack> {
        stacks
            .iter()
            .filter_map(|stack| {
                let mut services: Vec<DockerService> = stack
                    .services
                    .iter()
                    .filter(|service| self.matches(&stack.name, service, now, mature_after))
                    .cloned()
                    .collect();
                if services.is_empty() {
                    return None;
                }
                order_services(&mut services);
                let mut filtered = stack.clone();
                filtered.services = services;
                Some(filtered)
            })
            .collect()
    }
}

/// Order services for display: updatable services first, oldest available
/// update leading; everything else by creation time, newest first. Name
/// breaks ties so the order is stable across refreshes.
pub fn order_services(services: &mut [DockerService]) {
    services.sort_by(|a, b| match (a.has_updates, b.has_updates) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => match (a.image.latest_update, b.image.latest_update) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        },
        (false, false) => b
            .created_at
            .cmp(&a.created_at)
            .then_with(|| a.name.cmp(&b.name)),
    });
}
