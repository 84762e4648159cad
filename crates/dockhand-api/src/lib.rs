//! Typed client for the Docking Station backend
//!
//! This crate exposes the backend's REST API as the [`StationBackend`]
//! trait, with an HTTP implementation ([`HttpBackend`]) and the wire types
//! shared across the workspace. Orchestration lives in `dockhand-core`;
//! the trait exists so that crate can be driven by a scripted mock in tests.

mod client;
mod error;
pub mod routes;
mod types;

pub use client::HttpBackend;
pub use error::*;
pub use types::*;

use async_trait::async_trait;

/// Backend API surface consumed by the orchestration layer.
#[async_trait]
pub trait StationBackend: Send + Sync {
    /// List all stacks with their services. `no_cache` forces the backend
    /// to bypass its own response cache.
    async fn list_stacks(&self, no_cache: bool) -> Result<Vec<DockerStack>>;

    /// Fetch one stack by name.
    async fn get_stack(&self, stack_name: &str) -> Result<DockerStack>;

    /// Fetch one service.
    async fn get_service(&self, key: &ServiceKey, no_cache: bool) -> Result<DockerService>;

    /// Fetch progress messages strictly after `offset`.
    async fn poll_task(&self, key: &ServiceKey, offset: usize) -> Result<Vec<ProgressMessage>>;

    /// Create one update task covering several services.
    async fn create_batch_task(&self, request: &BatchUpdateRequest) -> Result<()>;

    /// Read app-level settings.
    async fn get_settings(&self) -> Result<AppSettings>;

    /// Apply a partial settings update, returning the new settings.
    async fn patch_settings(&self, patch: &AppSettingsPatch) -> Result<AppSettings>;

    /// List websites registered for latency monitoring.
    async fn list_monitors(&self) -> Result<Vec<MonitoredWebsite>>;

    /// Register a website for monitoring.
    async fn create_monitor(&self, create: &MonitorCreate) -> Result<MonitoredWebsite>;

    /// Update a monitored website.
    async fn update_monitor(&self, id: i64, patch: &MonitorPatch) -> Result<MonitoredWebsite>;

    /// Remove a monitored website and its history.
    async fn delete_monitor(&self, id: i64) -> Result<()>;

    /// Latency history for one monitor, newest first.
    async fn monitor_history(&self, id: i64, page: &PageQuery) -> Result<Vec<HistoryRecord>>;

    /// Latest latency sample, optionally rolling-averaged.
    async fn latest_history(&self, id: i64, rolling: &RollingAverageQuery)
        -> Result<HistoryRecord>;

    /// Delete the stored history for one monitor.
    async fn clear_history(&self, id: i64) -> Result<ClearHistoryResponse>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Connect to the backend configured in the global config and verify it
/// responds.
pub async fn connect(config: &dockhand_config::GlobalConfig) -> Result<HttpBackend> {
    let backend = HttpBackend::new(&config.backend)?;
    backend.ping().await?;
    Ok(backend)
}
