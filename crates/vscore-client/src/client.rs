//! Analysis backend REST client.
//!
//! - Credential injection with one retry after a 401
//! - HTTP client tuning (pooling, timeouts)
//! - Observability (tracing spans, metrics)

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use vscore_models::{AnalysisJob, ImportLinkRequest, SequenceId, SubmitScriptRequest};

use crate::config::ClientConfig;
use crate::credentials::{CredentialCache, CredentialProvider, EnvToken};
use crate::error::{ClientError, ClientResult};
use crate::metrics::record_request;

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// REST client for the analysis backend.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
    credentials: Arc<CredentialCache>,
}

impl ApiClient {
    /// Create a client that authenticates through `provider`.
    pub fn new(config: ClientConfig, provider: Arc<dyn CredentialProvider>) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("vscore-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self {
            http,
            config,
            credentials: Arc::new(CredentialCache::new(provider)),
        })
    }

    /// Create from environment variables, authenticating with `VSCORE_API_TOKEN`.
    pub fn from_env() -> ClientResult<Self> {
        let config = ClientConfig::from_env()?;
        Self::new(config, Arc::new(EnvToken))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Fetch the current state of a job once.
    ///
    /// A missing job is `NotFound`; transport problems surface as
    /// `Network`/`Timeout`.
    pub async fn get_job_status(&self, sequence_id: &SequenceId) -> ClientResult<AnalysisJob> {
        let url = self.endpoint(&format!(
            "api/v1/analyses/{}/status",
            urlencoding::encode(sequence_id.as_str())
        ));

        self.execute_request("get_job_status", sequence_id.as_str(), async {
            let response = self.send_authorized(|| self.http.get(&url)).await?;
            let status = response.status();

            match status {
                s if s.is_success() => {
                    let body = Self::read_json(response).await?;
                    AnalysisJob::from_payload(body, Some(sequence_id))
                        .map_err(|e| ClientError::invalid_response(e.to_string()))
                }
                StatusCode::NOT_FOUND => Err(ClientError::not_found(format!("job {}", sequence_id))),
                _ => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Submit a script for analysis.
    pub async fn submit_script(&self, request: &SubmitScriptRequest) -> ClientResult<AnalysisJob> {
        request.validate().map_err(ClientError::validation)?;
        self.create_job("submit_script", "api/v1/analyses/script", request).await
    }

    /// Import a video by link for analysis.
    pub async fn import_link(&self, request: &ImportLinkRequest) -> ClientResult<AnalysisJob> {
        request.validate().map_err(ClientError::validation)?;
        self.create_job("import_link", "api/v1/analyses/link", request).await
    }

    /// POST a submission. Never retried: the backend would create a second job.
    async fn create_job<B: Serialize + Sync>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> ClientResult<AnalysisJob> {
        let url = self.endpoint(path);

        self.execute_request(operation, "-", async {
            let response = self.send_authorized(|| self.http.post(&url).json(body)).await?;
            let status = response.status();

            if !status.is_success() {
                return Err(Self::handle_error_response(status, &url, response).await);
            }

            let body = Self::read_json(response).await?;
            AnalysisJob::from_payload(body, None)
                .map_err(|e| ClientError::invalid_response(e.to_string()))
        })
        .await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Send with the current credential, refreshing it once on 401.
    async fn send_authorized<F>(&self, build: F) -> ClientResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let token = self.credentials.token().await?;
        let response = Self::send(Self::decorate(build(), token.as_deref())).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Backend rejected credential, refreshing and retrying once");
        self.credentials.invalidate().await;
        let token = self.credentials.token().await?;
        Self::send(Self::decorate(build(), token.as_deref())).await
    }

    fn decorate(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let request = request.header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> ClientResult<Response> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(e.to_string())
            } else {
                ClientError::Network(e)
            }
        })
    }

    async fn read_json(response: Response) -> ClientResult<Value> {
        let bytes = response.bytes().await.map_err(ClientError::Network)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ClientError::invalid_response(format!(
                "body is not JSON: {} (body prefix: {})",
                e,
                String::from_utf8_lossy(&bytes[..bytes.len().min(200)])
            ))
        })
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(&self, operation: &str, subject: &str, fut: F) -> ClientResult<T>
    where
        F: std::future::Future<Output = ClientResult<T>>,
    {
        let span = info_span!("api_request", operation = %operation, subject = %subject);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => "ok",
            Err(e) => {
                debug!(
                    operation = %operation,
                    subject = %subject,
                    http_status = e.http_status(),
                    error_kind = e.kind(),
                    "API request failed: {}", e
                );
                e.kind()
            }
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> ClientError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000));
            if let Some(ms) = retry_after_ms {
                return ClientError::RateLimited(ms);
            }
        }

        let body = response.text().await.unwrap_or_default();
        ClientError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}
