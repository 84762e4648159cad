//! Test support utilities for dockhand-core
//!
//! Provides [`MockBackend`] and fixture builders for exercising the
//! orchestration layer without a running Docking Station backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dockhand_api::*;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Records which methods were called on the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    ListStacks { no_cache: bool },
    GetStack { stack_name: String },
    GetService { key: ServiceKey, no_cache: bool },
    PollTask { key: ServiceKey, offset: usize },
    CreateBatchTask { services: Vec<String> },
    GetSettings,
    PatchSettings,
    ListMonitors,
    CreateMonitor { name: String },
    UpdateMonitor { id: i64 },
    DeleteMonitor { id: i64 },
    MonitorHistory { id: i64 },
    LatestHistory { id: i64 },
    ClearHistory { id: i64 },
    Ping,
}

/// Scripted in-memory backend.
///
/// Stack and service reads are answered from `stacks`; polls pop from a
/// per-key script and fall back to empty batches once the script runs out.
pub struct MockBackend {
    pub calls: Arc<Mutex<Vec<MockCall>>>,
    pub stacks: Arc<Mutex<Vec<DockerStack>>>,
    /// When set, list_stacks fails with this error.
    pub list_error: Arc<Mutex<Option<ApiError>>>,
    /// When set, get_service fails with this error.
    pub service_error: Arc<Mutex<Option<ApiError>>>,
    pub poll_scripts: Arc<Mutex<HashMap<ServiceKey, VecDeque<Result<Vec<ProgressMessage>>>>>>,
    /// Result for create_batch_task calls
    pub batch_result: Arc<Mutex<Result<()>>>,
    pub settings: Arc<Mutex<AppSettings>>,
    pub monitors: Arc<Mutex<Vec<MonitoredWebsite>>>,
    pub history: Arc<Mutex<HashMap<i64, Vec<HistoryRecord>>>>,
    /// Result for ping calls
    pub ping_result: Arc<Mutex<Result<()>>>,
    next_monitor_id: AtomicI64,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend with empty data and success results.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            stacks: Arc::new(Mutex::new(Vec::new())),
            list_error: Arc::new(Mutex::new(None)),
            service_error: Arc::new(Mutex::new(None)),
            poll_scripts: Arc::new(Mutex::new(HashMap::new())),
            batch_result: Arc::new(Mutex::new(Ok(()))),
            settings: Arc::new(Mutex::new(AppSettings::default())),
            monitors: Arc::new(Mutex::new(Vec::new())),
            history: Arc::new(Mutex::new(HashMap::new())),
            ping_result: Arc::new(Mutex::new(Ok(()))),
            next_monitor_id: AtomicI64::new(1),
        }
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Check if a specific call was made
    pub fn was_called(&self, call: &MockCall) -> bool {
        self.calls.lock().unwrap().contains(call)
    }

    /// Replace the stack list answered by reads.
    pub fn put_stacks(&self, stacks: Vec<DockerStack>) {
        *self.stacks.lock().unwrap() = stacks;
    }

    pub fn put_settings(&self, settings: AppSettings) {
        *self.settings.lock().unwrap() = settings;
    }

    pub fn put_monitors(&self, monitors: Vec<MonitoredWebsite>) {
        *self.monitors.lock().unwrap() = monitors;
    }

    pub fn put_history(&self, id: i64, records: Vec<HistoryRecord>) {
        self.history.lock().unwrap().insert(id, records);
    }

    /// Queue poll responses for one service, served in order. Once the
    /// script is exhausted further polls return empty batches.
    pub fn script_poll(&self, key: &ServiceKey, responses: Vec<Result<Vec<ProgressMessage>>>) {
        self.poll_scripts
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .extend(responses);
    }

    pub fn fail_batch(&self, error: ApiError) {
        *self.batch_result.lock().unwrap() = Err(error);
    }

    pub fn restore_batch(&self) {
        *self.batch_result.lock().unwrap() = Ok(());
    }

    pub fn fail_services(&self, error: ApiError) {
        *self.service_error.lock().unwrap() = Some(error);
    }

    pub fn fail_list(&self, error: ApiError) {
        *self.list_error.lock().unwrap() = Some(error);
    }

    /// Service lists of every batch create, in call order.
    pub fn batch_requests(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                MockCall::CreateBatchTask { services } => Some(services.clone()),
                _ => None,
            })
            .collect()
    }

    /// Offsets requested for one service, in call order.
    pub fn poll_offsets(&self, key: &ServiceKey) -> Vec<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                MockCall::PollTask { key: k, offset } if k == key => Some(*offset),
                _ => None,
            })
            .collect()
    }

    /// How many times one service was fetched with caching bypassed.
    pub fn service_refetches(&self, key: &ServiceKey) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| {
                matches!(call, MockCall::GetService { key: k, no_cache: true } if k == key)
            })
            .count()
    }

    /// The `no_cache` flag of every stack list call, in call order.
    pub fn list_calls(&self) -> Vec<bool> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                MockCall::ListStacks { no_cache } => Some(*no_cache),
                _ => None,
            })
            .collect()
    }

    fn not_found(what: &str) -> ApiError {
        ApiError::Status {
            status: 404,
            message: format!("{} not found", what),
        }
    }
}

#[async_trait]
impl StationBackend for MockBackend {
    async fn list_stacks(&self, no_cache: bool) -> Result<Vec<DockerStack>> {
        self.record(MockCall::ListStacks { no_cache });
        if let Some(error) = self.list_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.stacks.lock().unwrap().clone())
    }

    async fn get_stack(&self, stack_name: &str) -> Result<DockerStack> {
        self.record(MockCall::GetStack {
            stack_name: stack_name.to_string(),
        });
        self.stacks
            .lock()
            .unwrap()
            .iter()
            .find(|stack| stack.name == stack_name)
            .cloned()
            .ok_or_else(|| Self::not_found("Stack"))
    }

    async fn get_service(&self, key: &ServiceKey, no_cache: bool) -> Result<DockerService> {
        self.record(MockCall::GetService {
            key: key.clone(),
            no_cache,
        });
        if let Some(error) = self.service_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.stacks
            .lock()
            .unwrap()
            .iter()
            .flat_map(|stack| stack.services.iter())
            .find(|service| service.key().as_ref() == Some(key))
            .cloned()
            .ok_or_else(|| Self::not_found("Service"))
    }

    async fn poll_task(&self, key: &ServiceKey, offset: usize) -> Result<Vec<ProgressMessage>> {
        self.record(MockCall::PollTask {
            key: key.clone(),
            offset,
        });
        let mut scripts = self.poll_scripts.lock().unwrap();
        match scripts.get_mut(key).and_then(|queue| queue.pop_front()) {
            Some(response) => response,
            None => Ok(Vec::new()),
        }
    }

    async fn create_batch_task(&self, request: &BatchUpdateRequest) -> Result<()> {
        self.record(MockCall::CreateBatchTask {
            services: request.services.clone(),
        });
        self.batch_result.lock().unwrap().clone()
    }

    async fn get_settings(&self) -> Result<AppSettings> {
        self.record(MockCall::GetSettings);
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn patch_settings(&self, patch: &AppSettingsPatch) -> Result<AppSettings> {
        self.record(MockCall::PatchSettings);
        let mut settings = self.settings.lock().unwrap();
        if let Some(auto) = &patch.auto_updater {
            if let Some(enabled) = auto.enabled {
                settings.auto_updater.enabled = enabled;
            }
            if let Some(interval) = &auto.interval {
                settings.auto_updater.interval = interval.clone();
            }
            if let Some(max_concurrent) = auto.max_concurrent {
                settings.auto_updater.max_concurrent = max_concurrent;
            }
        }
        if let Some(server) = &patch.server {
            if let Some(max_age) = &server.cache_control_max_age {
                settings.server.cache_control_max_age = max_age.clone();
            }
            if let Some(dryrun) = server.dryrun {
                settings.server.dryrun = dryrun;
            }
            if let Some(keywords) = &server.ignore_compose_stack_name_keywords {
                settings.server.ignore_compose_stack_name_keywords = keywords.clone();
            }
            if let Some(mature) = &server.time_until_update_is_mature {
                settings.server.time_until_update_is_mature = mature.clone();
            }
        }
        Ok(settings.clone())
    }

    async fn list_monitors(&self) -> Result<Vec<MonitoredWebsite>> {
        self.record(MockCall::ListMonitors);
        Ok(self.monitors.lock().unwrap().clone())
    }

    async fn create_monitor(&self, create: &MonitorCreate) -> Result<MonitoredWebsite> {
        self.record(MockCall::CreateMonitor {
            name: create.name.clone(),
        });
        let now = Utc::now();
        let monitor = MonitoredWebsite {
            id: self.next_monitor_id.fetch_add(1, Ordering::SeqCst),
            name: create.name.clone(),
            url: create.url.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.monitors.lock().unwrap().push(monitor.clone());
        Ok(monitor)
    }

    async fn update_monitor(&self, id: i64, patch: &MonitorPatch) -> Result<MonitoredWebsite> {
        self.record(MockCall::UpdateMonitor { id });
        let mut monitors = self.monitors.lock().unwrap();
        let monitor = monitors
            .iter_mut()
            .find(|monitor| monitor.id == id)
            .ok_or_else(|| Self::not_found("Monitor"))?;
        if let Some(name) = &patch.name {
            monitor.name = name.clone();
        }
        if let Some(url) = &patch.url {
            monitor.url = url.clone();
        }
        if let Some(is_active) = patch.is_active {
            monitor.is_active = is_active;
        }
        monitor.updated_at = Utc::now();
        Ok(monitor.clone())
    }

    async fn delete_monitor(&self, id: i64) -> Result<()> {
        self.record(MockCall::DeleteMonitor { id });
        let mut monitors = self.monitors.lock().unwrap();
        let before = monitors.len();
        monitors.retain(|monitor| monitor.id != id);
        if monitors.len() == before {
            return Err(Self::not_found("Monitor"));
        }
        self.history.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn monitor_history(&self, id: i64, page: &PageQuery) -> Result<Vec<HistoryRecord>> {
        self.record(MockCall::MonitorHistory { id });
        let history = self.history.lock().unwrap();
        let records = history.get(&id).cloned().unwrap_or_default();
        let offset = page.offset.unwrap_or(0).min(records.len());
        let end = match page.limit {
            Some(limit) => (offset + limit).min(records.len()),
            None => records.len(),
        };
        Ok(records[offset..end].to_vec())
    }

    async fn latest_history(
        &self,
        id: i64,
        rolling: &RollingAverageQuery,
    ) -> Result<HistoryRecord> {
        self.record(MockCall::LatestHistory { id });
        let history = self.history.lock().unwrap();
        let records = history
            .get(&id)
            .filter(|records| !records.is_empty())
            .ok_or_else(|| Self::not_found("History"))?;
        let last = records[records.len() - 1].clone();
        if rolling.enabled {
            let window = rolling.window.unwrap_or(10) as usize;
            let tail = &records[records.len().saturating_sub(window)..];
            let average = tail.iter().map(|r| r.latency_ms).sum::<f64>() / tail.len() as f64;
            Ok(HistoryRecord {
                id: None,
                latency_ms: average,
                created_at: last.created_at,
            })
        } else {
            Ok(last)
        }
    }

    async fn clear_history(&self, id: i64) -> Result<ClearHistoryResponse> {
        self.record(MockCall::ClearHistory { id });
        let deleted = self
            .history
            .lock()
            .unwrap()
            .remove(&id)
            .map(|records| records.len() as u64)
            .unwrap_or(0);
        Ok(ClearHistoryResponse { deleted })
    }

    async fn ping(&self) -> Result<()> {
        self.record(MockCall::Ping);
        self.ping_result.lock().unwrap().clone()
    }
}

fn fixed_time(value: &str) -> DateTime<Utc> {
    value.parse().unwrap()
}

/// A running service named the way compose names containers
/// (`{stack}-{service}-1`), with compose labels resolved.
pub fn mock_service(stack_name: &str, service_name: &str, has_updates: bool) -> DockerService {
    let created_at = fixed_time("2024-01-01T08:00:00Z");
    DockerService {
        id: format!("{}-{}-cid", stack_name, service_name),
        created_at,
        uptime: "up 2 days".to_string(),
        has_updates,
        homepage_url: None,
        image: DockerImage {
            id: format!("sha256:{}{}", stack_name, service_name),
            created_at,
            has_updates,
            image_name: format!("library/{}", service_name),
            image_tag: "latest".to_string(),
            latest_update: has_updates.then(|| fixed_time("2024-01-15T00:00:00Z")),
            latest_version: None,
            repo_local_digest: None,
            version: None,
        },
        labels: HashMap::new(),
        name: format!("{}-{}-1", stack_name, service_name),
        ports: Vec::new(),
        stack_name: Some(stack_name.to_string()),
        service_name: Some(service_name.to_string()),
        status: ServiceStatus::Running,
    }
}

/// A stack whose counters match its service list.
pub fn mock_stack(name: &str, services: Vec<DockerService>) -> DockerStack {
    let has_updates = services.iter().any(|service| service.has_updates);
    let running = services.len() as u32;
    DockerStack {
        name: name.to_string(),
        config_files: vec![format!("/opt/stacks/{}/compose.yaml", name)],
        services,
        created: 0,
        dead: 0,
        exited: 0,
        paused: 0,
        restarting: 0,
        running,
        has_updates,
    }
}

pub fn mock_monitor(id: i64, name: &str, url: &str) -> MonitoredWebsite {
    let at = fixed_time("2024-03-01T00:00:00Z");
    MonitoredWebsite {
        id,
        name: name.to_string(),
        url: url.to_string(),
        is_active: true,
        created_at: at,
        updated_at: at,
    }
}

pub fn mock_history_record(id: i64, latency_ms: f64, created_at: &str) -> HistoryRecord {
    HistoryRecord {
        id: Some(id),
        latency_ms,
        created_at: fixed_time(created_at),
    }
}
