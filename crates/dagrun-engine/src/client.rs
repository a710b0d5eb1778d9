//! HTTP transport for the execution engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dagrun_types::{RunStatus, WorkflowRun};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::engine::{engine_conf, ExecutionEngine};
use crate::error::{EngineError, Result};
use crate::protocol::{Credentials, EngineGeneration, TriggerOutcome, WireProtocol};

/// Default timeout for engine requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the request correlation id.
const CORRELATION_HEADER: &str = "correlation-id";

/// Execution engine reached over HTTP.
///
/// Holds exactly one [`WireProtocol`], fixed when the engine is built.
#[derive(Clone)]
pub struct HttpEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    http: reqwest::Client,
    base_url: Url,
    protocol: Arc<dyn WireProtocol>,
    credentials: Credentials,
    timeout: Duration,
}

impl std::fmt::Debug for HttpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEngine")
            .field("base_url", &self.inner.base_url.as_str())
            .field("generation", &self.inner.protocol.generation())
            .field("credentials", &self.inner.credentials)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl HttpEngine {
    /// Start building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Build a URL for a protocol-relative path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        self.inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(EngineError::from)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.inner.credentials {
            Credentials::None => request,
            Credentials::Bearer { token } => request.bearer_auth(token),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }

    async fn send(&self, request: RequestBuilder, subject: &str) -> Result<Value> {
        let response = self
            .authorize(request)
            .timeout(self.inner.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(subject = %subject, error = %e, "Engine request failed");
                EngineError::from(e)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(self.extract_error(status, &body, subject))
    }

    /// Map a failed answer onto the error taxonomy.
    ///
    /// The stable API puts its message in `detail`, the experimental one in
    /// `error`.
    fn extract_error(&self, status: StatusCode, body: &str, subject: &str) -> EngineError {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                ["detail", "error", "title", "message"]
                    .iter()
                    .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_else(|| {
                if body.is_empty() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    body.to_string()
                }
            });

        match status {
            StatusCode::CONFLICT => EngineError::Conflict {
                run_id: subject.to_string(),
            },
            StatusCode::NOT_FOUND => EngineError::NotFound(format!("{}: {}", subject, message)),
            _ => EngineError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[async_trait]
impl ExecutionEngine for HttpEngine {
    fn protocol(&self) -> &dyn WireProtocol {
        self.inner.protocol.as_ref()
    }

    async fn trigger(
        &self,
        workflow_name: &str,
        run_id: &str,
        conf: &Value,
        correlation_id: &str,
    ) -> Result<TriggerOutcome> {
        let conf = engine_conf(conf, run_id, correlation_id);
        let request = self
            .inner
            .protocol
            .build_trigger_request(workflow_name, run_id, &conf);
        let url = self.url(&request.path)?;

        debug!(
            workflow = %workflow_name,
            run_id = %run_id,
            generation = %self.generation(),
            "Triggering run on engine"
        );

        let builder = self
            .inner
            .http
            .post(url)
            .header(CORRELATION_HEADER, correlation_id)
            .json(&request.body);
        let raw = self.send(builder, run_id).await?;
        self.inner.protocol.parse_trigger_response(&raw)
    }

    async fn fetch_status(&self, run: &WorkflowRun) -> Result<RunStatus> {
        let key = self.inner.protocol.status_query_key(run);
        let url = self.url(&self.inner.protocol.status_path(&run.workflow_name, key))?;

        let raw = self.send(self.inner.http.get(url), &run.run_id).await?;
        let status = self.inner.protocol.parse_status_response(&raw)?;

        debug!(
            workflow = %run.workflow_name,
            run_id = %run.run_id,
            status = %status,
            "Polled engine status"
        );
        Ok(status)
    }
}

/// Builder for an [`HttpEngine`].
#[derive(Debug)]
pub struct EngineBuilder {
    base_url: Option<String>,
    generation: EngineGeneration,
    credentials: Credentials,
    timeout: Duration,
}

impl EngineBuilder {
    /// Builder for a stable engine with no credentials and the default timeout.
    pub fn new() -> Self {
        Self {
            base_url: None,
            generation: EngineGeneration::default(),
            credentials: Credentials::None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Engine base URL; API paths are joined below it.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// API generation the engine speaks.
    pub fn generation(mut self, generation: EngineGeneration) -> Self {
        self.generation = generation;
        self
    }

    /// Credentials sent with every request.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the engine. Fails without a parseable base URL.
    pub fn build(self) -> Result<HttpEngine> {
        let base_url = self
            .base_url
            .ok_or_else(|| EngineError::Config("base_url is required".to_string()))?;

        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let user_agent = format!("dagrun-engine/{}", env!("CARGO_PKG_VERSION"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(HttpEngine {
            inner: Arc::new(EngineInner {
                http,
                base_url,
                protocol: self.generation.protocol(),
                credentials: self.credentials,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
