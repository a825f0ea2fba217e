//! REST memory backend
//!
//! Talks to an external memory service over HTTP. The resource is resolved
//! at `init`: by configured id, else by name, creating it when absent, then
//! polled until it settles.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::{CaptureMode, MemoryBackend, ResourceStatus};
use crate::{
    errors::{RecallError, Result},
    namespace::Namespace,
    types::MemoryRecord,
};

/// Configuration for the REST backend
#[derive(Debug, Clone)]
pub struct RestBackendConfig {
    /// Base URL of the memory service
    pub endpoint: String,
    /// Bearer token, passed through untouched
    pub api_key: Option<String>,
    /// Existing resource id; skips lookup by name
    pub memory_id: Option<String>,
    /// Resource name to find or create
    pub memory_name: String,
    /// Capture mode the resource was provisioned with
    pub capture_mode: CaptureMode,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Delay between status polls during `init`
    pub poll_interval: Duration,
    /// Give up waiting for the resource after this long
    pub poll_timeout: Duration,
}

impl Default for RestBackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8700".to_string(),
            api_key: None,
            memory_id: None,
            memory_name: "RecallMemory".to_string(),
            capture_mode: CaptureMode::Explicit,
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(3),
            poll_timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ResourceSummary {
    id: String,
    #[serde(default)]
    name: Option<String>,
    status: ResourceStatus,
}

#[derive(Serialize)]
struct CreateResourceRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct ListRecordsRequest<'a> {
    namespace: &'a str,
    limit: usize,
}

#[derive(Serialize)]
struct SearchRecordsRequest<'a> {
    namespace: &'a str,
    query: &'a str,
    top_k: usize,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    namespace: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    records: Vec<MemoryRecord>,
}

/// MemoryBackend backed by a remote memory service
pub struct RestMemoryBackend {
    config: RestBackendConfig,
    http_client: reqwest::Client,
    memory_id: OnceCell<String>,
}

impl RestMemoryBackend {
    pub fn new(config: RestBackendConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RecallError::ConfigError(format!("HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
            memory_id: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http_client.request(method, self.url(path));
        match self.config.api_key {
            Some(ref key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn resource_id(&self) -> Result<&str> {
        self.memory_id
            .get()
            .map(String::as_str)
            .ok_or_else(|| RecallError::backend_unavailable("memory resource not initialized"))
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|e| RecallError::backend_unavailable(format!("request failed: {e}")))
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RecallError::backend_unavailable(format!(
            "memory service returned {status}: {body}"
        )))
    }

    async fn read_records(response: reqwest::Response) -> Result<Vec<MemoryRecord>> {
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(vec![]);
        }
        let response = Self::expect_success(response).await?;
        let body: RecordsResponse = response
            .json()
            .await
            .map_err(|e| RecallError::backend_unavailable(format!("malformed records: {e}")))?;
        Ok(body.records)
    }

    async fn get_resource(&self, id: &str) -> Result<ResourceSummary> {
        let response = self
            .send(self.request(reqwest::Method::GET, &format!("/memories/{id}")))
            .await?;
        let response = Self::expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| RecallError::backend_unavailable(format!("malformed resource: {e}")))
    }

    async fn find_resource(&self, name: &str) -> Result<Option<ResourceSummary>> {
        let response = self
            .send(
                self.request(reqwest::Method::GET, "/memories")
                    .query(&[("name", name)]),
            )
            .await?;
        let response = Self::expect_success(response).await?;
        let resources: Vec<ResourceSummary> = response
            .json()
            .await
            .map_err(|e| RecallError::backend_unavailable(format!("malformed listing: {e}")))?;

        Ok(resources
            .into_iter()
            .find(|r| r.name.as_deref() == Some(name) || r.id.starts_with(name)))
    }

    async fn create_resource(&self, name: &str) -> Result<ResourceSummary> {
        info!("Creating memory resource '{}'", name);
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/memories")
                    .json(&CreateResourceRequest { name }),
            )
            .await?;

        if response.status() == StatusCode::CONFLICT {
            warn!("Memory resource '{}' already exists; looking it up", name);
            return self.find_resource(name).await?.ok_or_else(|| {
                RecallError::backend_unavailable(format!(
                    "create reported '{name}' exists but it could not be found"
                ))
            });
        }

        let response = Self::expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| RecallError::backend_unavailable(format!("malformed resource: {e}")))
    }

    /// Poll until the resource leaves the provisioning state
    async fn wait_until_active(&self, id: &str) -> Result<String> {
        let deadline = Instant::now() + self.config.poll_timeout;
        let mut last = None;

        loop {
            match self.get_resource(id).await {
                Ok(resource) => {
                    if last != Some(resource.status) {
                        debug!("Memory {} status = {:?}", id, resource.status);
                        last = Some(resource.status);
                    }
                    if resource.status.is_settled() {
                        return match resource.status {
                            ResourceStatus::Active => Ok(resource.id),
                            status => Err(RecallError::backend_unavailable(format!(
                                "memory {id} is {status:?}"
                            ))),
                        };
                    }
                },
                Err(e) => debug!("Polling memory {} failed: {}", id, e),
            }

            if Instant::now() >= deadline {
                return Err(RecallError::backend_unavailable(format!(
                    "memory {id} did not become ACTIVE within {}s",
                    self.config.poll_timeout.as_secs()
                )));
            }
            sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl MemoryBackend for RestMemoryBackend {
    async fn init(&self) -> Result<String> {
        if let Some(id) = self.memory_id.get() {
            return Ok(id.clone());
        }

        let id = if let Some(ref id) = self.config.memory_id {
            info!("Using configured memory resource {}", id);
            self.wait_until_active(id).await?
        } else {
            let name = &self.config.memory_name;
            let resource = match self.find_resource(name).await? {
                Some(existing) => existing,
                None => self.create_resource(name).await?,
            };
            self.wait_until_active(&resource.id).await?
        };

        info!("Memory resource {} is ACTIVE", id);
        Ok(self.memory_id.get_or_init(|| id).clone())
    }

    async fn fetch(&self, namespace: &Namespace, limit: usize) -> Result<Vec<MemoryRecord>> {
        let id = self.resource_id()?;
        let response = self
            .send(
                self.request(reqwest::Method::POST, &format!("/memories/{id}/records/list"))
                    .json(&ListRecordsRequest {
                        namespace: namespace.as_str(),
                        limit,
                    }),
            )
            .await?;
        Self::read_records(response).await
    }

    async fn search(
        &self,
        namespace: &Namespace,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let id = self.resource_id()?;
        let response = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/memories/{id}/records/search"),
                )
                .json(&SearchRecordsRequest {
                    namespace: namespace.as_str(),
                    query,
                    top_k,
                }),
            )
            .await?;
        Self::read_records(response).await
    }

    async fn capture(
        &self,
        namespace: &Namespace,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let id = self.resource_id()?;
        let response = self
            .send(
                self.request(reqwest::Method::POST, &format!("/memories/{id}/records"))
                    .json(&CreateRecordRequest {
                        namespace: namespace.as_str(),
                        content,
                        metadata,
                    }),
            )
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    fn capture_mode(&self) -> CaptureMode {
        self.config.capture_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> RestBackendConfig {
        RestBackendConfig {
            endpoint: server.uri(),
            poll_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    fn record_json(content: &str, score: f64) -> serde_json::Value {
        json!({
            "id": format!("rec-{content}"),
            "namespace": "/summaries/u1/profile-u1",
            "content": content,
            "created_at": "2025-01-01T00:00:00Z",
            "score": score
        })
    }

    async fn active_backend(server: &MockServer) -> RestMemoryBackend {
        Mock::given(method("GET"))
            .and(path("/memories/mem-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "mem-1", "name": "RecallMemory", "status": "ACTIVE"})),
            )
            .mount(server)
            .await;

        let backend = RestMemoryBackend::new(RestBackendConfig {
            memory_id: Some("mem-1".to_string()),
            ..config_for(server)
        })
        .unwrap();
        backend.init().await.unwrap();
        backend
    }

    #[tokio::test]
    async fn test_init_finds_existing_resource_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/memories"))
            .and(query_param("name", "RecallMemory"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "mem-9", "name": "RecallMemory", "status": "ACTIVE"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/memories/mem-9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "mem-9", "name": "RecallMemory", "status": "ACTIVE"})),
            )
            .mount(&server)
            .await;

        let backend = RestMemoryBackend::new(config_for(&server)).unwrap();
        assert_eq!(backend.init().await.unwrap(), "mem-9");
    }

    #[tokio::test]
    async fn test_init_creates_missing_resource() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/memories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/memories"))
            .and(body_partial_json(json!({"name": "RecallMemory"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "mem-new", "status": "CREATING"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/memories/mem-new"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "mem-new", "status": "ACTIVE"})),
            )
            .mount(&server)
            .await;

        let backend = RestMemoryBackend::new(config_for(&server)).unwrap();
        assert_eq!(backend.init().await.unwrap(), "mem-new");
    }

    #[tokio::test]
    async fn test_init_fails_on_failed_resource() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/memories/mem-bad"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "mem-bad", "status": "FAILED"})),
            )
            .mount(&server)
            .await;

        let backend = RestMemoryBackend::new(RestBackendConfig {
            memory_id: Some("mem-bad".to_string()),
            ..config_for(&server)
        })
        .unwrap();
        let err = backend.init().await.unwrap_err();
        assert!(err.is_memory_fault());
        assert!(err.to_string().contains("Failed"));
    }

    #[tokio::test]
    async fn test_init_times_out_while_creating() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/memories/mem-slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "mem-slow", "status": "CREATING"})),
            )
            .mount(&server)
            .await;

        let backend = RestMemoryBackend::new(RestBackendConfig {
            memory_id: Some("mem-slow".to_string()),
            ..config_for(&server)
        })
        .unwrap();
        let err = backend.init().await.unwrap_err();
        assert!(err.to_string().contains("did not become ACTIVE"));
    }

    #[tokio::test]
    async fn test_search_sends_namespace_and_bound() {
        let server = MockServer::start().await;
        let backend = active_backend(&server).await;
        Mock::given(method("POST"))
            .and(path("/memories/mem-1/records/search"))
            .and(body_partial_json(json!({
                "namespace": "/summaries/u1/profile-u1",
                "query": "favorite color",
                "top_k": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [record_json("favorite color is blue", 0.9)]
            })))
            .mount(&server)
            .await;

        let hits = backend
            .search(
                &Namespace::new("/summaries/u1/profile-u1"),
                "favorite color",
                3,
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "favorite color is blue");
        assert_eq!(hits[0].score, Some(0.9));
    }

    #[tokio::test]
    async fn test_missing_namespace_is_empty() {
        let server = MockServer::start().await;
        let backend = active_backend(&server).await;
        Mock::given(method("POST"))
            .and(path("/memories/mem-1/records/list"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let records = backend
            .fetch(&Namespace::new("/summaries/u1/s1"), 12)
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        let backend = active_backend(&server).await;
        Mock::given(method("POST"))
            .and(path("/memories/mem-1/records"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = backend
            .capture(&Namespace::new("/summaries/u1/s1"), "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::MemoryBackendUnavailable(_)));
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_calls_before_init_fail() {
        let backend = RestMemoryBackend::new(RestBackendConfig::default()).unwrap();
        let err = backend
            .fetch(&Namespace::new("/summaries/u1/s1"), 5)
            .await
            .unwrap_err();
        assert!(err.is_memory_fault());
    }
}
