//! HTTP implementation of the backend trait using reqwest

use crate::{
    routes, ApiError, AppSettings, AppSettingsPatch, BatchUpdateRequest, ClearHistoryResponse,
    DockerService, DockerStack, HistoryRecord, MonitorCreate, MonitorPatch, MonitoredWebsite,
    PageQuery, ProgressMessage, Result, RollingAverageQuery, ServiceKey, StationBackend,
};
use async_trait::async_trait;
use dockhand_config::BackendConfig;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Backend client speaking JSON over HTTP to a Docking Station server.
pub struct HttpBackend {
    http: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base = normalize_base(&config.url)?;
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Connection(e.to_string()))?;

        Ok(Self { http, base })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut request = self.http.get(self.url(path)?);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;
        decode(response).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http
            .request(method, self.url(path)?)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn send_json_no_response<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<()> {
        let response = self
            .http
            .request(method, self.url(path)?)
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl StationBackend for HttpBackend {
    async fn list_stacks(&self, no_cache: bool) -> Result<Vec<DockerStack>> {
        self.get_json(&routes::stacks(), &no_cache_query(no_cache))
            .await
    }

    async fn get_stack(&self, stack_name: &str) -> Result<DockerStack> {
        self.get_json(&routes::stack(stack_name), &[]).await
    }

    async fn get_service(&self, key: &ServiceKey, no_cache: bool) -> Result<DockerService> {
        self.get_json(
            &routes::service(&key.stack_name, &key.service_name),
            &no_cache_query(no_cache),
        )
        .await
    }

    async fn poll_task(&self, key: &ServiceKey, offset: usize) -> Result<Vec<ProgressMessage>> {
        self.get_json(
            &routes::service_task(&key.stack_name, &key.service_name),
            &[("offset", offset.to_string())],
        )
        .await
    }

    async fn create_batch_task(&self, request: &BatchUpdateRequest) -> Result<()> {
        tracing::debug!("Creating batch task for {} services", request.services.len());
        self.send_json_no_response(reqwest::Method::POST, &routes::batch_update(), request)
            .await
    }

    async fn get_settings(&self) -> Result<AppSettings> {
        self.get_json(&routes::settings(), &[]).await
    }

    async fn patch_settings(&self, patch: &AppSettingsPatch) -> Result<AppSettings> {
        self.send_json(reqwest::Method::PATCH, &routes::settings(), patch)
            .await
    }

    async fn list_monitors(&self) -> Result<Vec<MonitoredWebsite>> {
        self.get_json(&routes::monitors(), &[]).await
    }

    async fn create_monitor(&self, create: &MonitorCreate) -> Result<MonitoredWebsite> {
        self.send_json(reqwest::Method::PUT, &routes::monitors(), create)
            .await
    }

    async fn update_monitor(&self, id: i64, patch: &MonitorPatch) -> Result<MonitoredWebsite> {
        self.send_json(reqwest::Method::PATCH, &routes::monitor(id), patch)
            .await
    }

    async fn delete_monitor(&self, id: i64) -> Result<()> {
        let response = self.http.delete(self.url(&routes::monitor(id))?).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn monitor_history(&self, id: i64, page: &PageQuery) -> Result<Vec<HistoryRecord>> {
        let mut query = Vec::new();
        if let Some(offset) = page.offset {
            query.push(("offset", offset.to_string()));
        }
        if let Some(limit) = page.limit {
            query.push(("limit", limit.to_string()));
        }
        self.get_json(&routes::monitor_history(id), &query).await
    }

    async fn latest_history(
        &self,
        id: i64,
        rolling: &RollingAverageQuery,
    ) -> Result<HistoryRecord> {
        let mut query = vec![("rollingAverageEnabled", rolling.enabled.to_string())];
        if rolling.enabled {
            if let Some(window) = rolling.window {
                query.push(("rollingAverageWindow", window.to_string()));
            }
        }
        self.get_json(&routes::monitor_history_latest(id), &query)
            .await
    }

    async fn clear_history(&self, id: i64) -> Result<ClearHistoryResponse> {
        let response = self
            .http
            .delete(self.url(&routes::monitor_history(id))?)
            .send()
            .await?;
        decode(response).await
    }

    async fn ping(&self) -> Result<()> {
        let response = self.http.get(self.url(&routes::settings())?).send().await?;
        check_status(response).await?;
        tracing::debug!("Backend reachable at {}", self.base);
        Ok(())
    }
}

fn no_cache_query(no_cache: bool) -> Vec<(&'static str, String)> {
    if no_cache {
        vec![("no_cache", "true".to_string())]
    } else {
        Vec::new()
    }
}

/// Parses the base URL, forcing a trailing slash so `Url::join` appends
/// instead of replacing the last path segment.
fn normalize_base(url: &str) -> Result<Url> {
    let mut base =
        Url::parse(url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", url, e)))?;
    if base.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(url.to_string()));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    };
    let message = match response.text().await {
        Ok(body) if !body.is_empty() => extract_detail(&body).unwrap_or(body),
        _ => fallback(),
    };

    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// FastAPI-style error bodies carry the human message under `detail`.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("detail")?.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_appends_slash() {
        let base = normalize_base("http://localhost:3001").unwrap();
        assert_eq!(base.as_str(), "http://localhost:3001/");

        let joined = base.join("api/stacks").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:3001/api/stacks");
    }

    #[test]
    fn test_normalize_base_keeps_path_prefix() {
        let base = normalize_base("http://gateway.lan/docking").unwrap();
        let joined = base.join("api/stacks").unwrap();
        assert_eq!(joined.as_str(), "http://gateway.lan/docking/api/stacks");
    }

    #[test]
    fn test_normalize_base_rejects_garbage() {
        assert!(normalize_base("not a url").is_err());
        assert!(normalize_base("data:text/plain,hi").is_err());
    }

    #[test]
    fn test_extract_detail() {
        assert_eq!(
            extract_detail(r#"{"detail": "Stack not found"}"#),
            Some("Stack not found".to_string())
        );
        assert_eq!(extract_detail("plain text"), None);
        assert_eq!(extract_detail(r#"{"error": "other shape"}"#), None);
    }
}
