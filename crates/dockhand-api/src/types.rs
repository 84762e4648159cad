//! Wire types for the Docking Station backend API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Well-known stages reported by update tasks.
///
/// The backend may emit free-form stages as well; these are the ones the
/// display timeline recognizes. Terminal detection compares
/// case-insensitively against [`stages::FINISHED`].
pub mod stages {
    pub const CONNECTING: &str = "Connecting";
    pub const STARTING: &str = "Starting";
    pub const COMPOSE_UP: &str = "docker compose up --pull always";
    pub const IMAGE_PRUNE: &str = "docker image prune";
    pub const FINISHED: &str = "Finished";

    /// Canonical display order of the known stages.
    pub const TIMELINE: [&str; 5] = [CONNECTING, STARTING, COMPOSE_UP, IMAGE_PRUNE, FINISHED];
}

/// Composite identifier for one compose service: `(stack, service)`.
///
/// Renders and parses as `"{stack}/{service}"`, the form the batch update
/// endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceKey {
    pub stack_name: String,
    pub service_name: String,
}

impl ServiceKey {
    pub fn new(stack_name: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            service_name: service_name.into(),
        }
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.stack_name, self.service_name)
    }
}

impl std::str::FromStr for ServiceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((stack, service)) if !stack.is_empty() && !service.is_empty() => {
                Ok(Self::new(stack, service))
            }
            _ => Err(format!(
                "Invalid service identifier '{}': expected 'stack/service'",
                s
            )),
        }
    }
}

/// One unit of update-task output, delivered as a JSON array per poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub stage: String,
    pub message: Option<String>,
}

impl ProgressMessage {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: None,
        }
    }

    pub fn with_message(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: Some(message.into()),
        }
    }

    /// The synthetic message appended locally before the first poll returns.
    pub fn connecting() -> Self {
        Self::new(stages::CONNECTING)
    }

    /// Terminal stage check, case-insensitive per the task protocol.
    pub fn is_terminal(&self) -> bool {
        self.stage.eq_ignore_ascii_case(stages::FINISHED)
    }
}

/// Container status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Removing => write!(f, "removing"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Image metadata attached to a service, including update availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImage {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub has_updates: bool,
    pub image_name: String,
    pub image_tag: String,
    pub latest_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latest_version: Option<String>,
    #[serde(default)]
    pub repo_local_digest: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl DockerImage {
    /// Whether the available update is older than `min_age` at `now`.
    ///
    /// Services with no recorded update timestamp never count as matured.
    pub fn is_matured(&self, now: DateTime<Utc>, min_age: Duration) -> bool {
        match self.latest_update {
            Some(published) => {
                let age = now
                    .signed_duration_since(published)
                    .to_std()
                    .unwrap_or_default();
                age >= min_age
            }
            None => false,
        }
    }

    /// `name:tag` as shown in listings.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.image_name, self.image_tag)
    }
}

/// Published port binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: u16,
}

/// One compose service (container view).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerService {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub uptime: String,
    pub has_updates: bool,
    #[serde(default)]
    pub homepage_url: Option<String>,
    pub image: DockerImage,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub name: String,
    #[serde(default)]
    pub ports: Vec<PortBinding>,
    #[serde(default)]
    pub stack_name: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    pub status: ServiceStatus,
}

impl DockerService {
    /// Composite key, when the backend attributed the container to a stack.
    pub fn key(&self) -> Option<ServiceKey> {
        match (&self.stack_name, &self.service_name) {
            (Some(stack), Some(service)) => Some(ServiceKey::new(stack, service)),
            _ => None,
        }
    }
}

/// One compose stack with its services and per-state container counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerStack {
    pub name: String,
    #[serde(default)]
    pub config_files: Vec<String>,
    pub services: Vec<DockerService>,
    pub created: u32,
    pub dead: u32,
    pub exited: u32,
    pub paused: u32,
    pub restarting: u32,
    pub running: u32,
    pub has_updates: bool,
}

/// Flags forwarded verbatim to the update endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOptions {
    #[serde(default)]
    pub infer_envfile: bool,
    #[serde(default)]
    pub prune_images: bool,
    #[serde(default = "default_true")]
    pub restart_containers: bool,
}

fn default_true() -> bool {
    true
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            infer_envfile: false,
            prune_images: false,
            restart_containers: true,
        }
    }
}

/// Body of `POST api/stacks/batch_update`: service identifiers plus flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateRequest {
    pub services: Vec<String>,
    #[serde(flatten)]
    pub options: UpdateOptions,
}

impl BatchUpdateRequest {
    /// Builds the request for one stack, formatting each service as
    /// `"{stack}/{service}"`.
    pub fn for_stack(stack_name: &str, service_names: &[String], options: UpdateOptions) -> Self {
        Self {
            services: service_names
                .iter()
                .map(|service| format!("{}/{}", stack_name, service))
                .collect(),
            options,
        }
    }
}

/// Auto-updater section of the backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoUpdaterSettings {
    pub enabled: bool,
    pub interval: String,
    pub max_concurrent: u32,
}

impl Default for AutoUpdaterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: "1d".to_string(),
            max_concurrent: 4,
        }
    }
}

/// Server section of the backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    pub cache_control_max_age: String,
    pub dryrun: bool,
    pub ignore_compose_stack_name_keywords: Vec<String>,
    pub possible_homepage_labels: Vec<String>,
    pub possible_image_version_labels: Vec<String>,
    pub time_until_update_is_mature: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            cache_control_max_age: "1d".to_string(),
            dryrun: false,
            ignore_compose_stack_name_keywords: vec!["devcontainer".to_string()],
            possible_homepage_labels: vec![
                "homepage".to_string(),
                "homepage.href".to_string(),
                "org.label-schema.url".to_string(),
            ],
            possible_image_version_labels: vec![
                "org.opencontainers.image.version".to_string(),
                "version".to_string(),
            ],
            time_until_update_is_mature: "1w".to_string(),
        }
    }
}

/// App-level settings served by `GET api/settings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub auto_updater: AutoUpdaterSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Partial settings document for `PATCH api/settings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_updater: Option<AutoUpdaterPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSettingsPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoUpdaterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control_max_age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dryrun: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_compose_stack_name_keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_until_update_is_mature: Option<String>,
}

/// A website registered for latency monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredWebsite {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `PUT api/monitor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorCreate {
    pub name: String,
    pub url: String,
}

/// Body of `PATCH api/monitor/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// One latency sample. `id` is absent when the backend returns a rolling
/// average instead of a stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub latency_ms: f64,
    pub created_at: DateTime<Utc>,
}

/// Response of `DELETE api/history/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryResponse {
    pub deleted: u64,
}

/// Pagination for history queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// Rolling-average options for the latest-latency query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollingAverageQuery {
    pub enabled: bool,
    pub window: Option<u32>,
}

/// Parses interval strings the backend uses in its settings (`"45s"`,
/// `"30m"`, `"12h"`, `"1d"`, `"1w"`; a bare number means seconds).
pub fn parse_interval(input: &str) -> Option<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, ""),
    };
    let value: u64 = digits.parse().ok()?;
    let secs = match unit {
        "" | "s" => value,
        "m" => value.checked_mul(60)?,
        "h" => value.checked_mul(3_600)?,
        "d" => value.checked_mul(86_400)?,
        "w" => value.checked_mul(604_800)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}
