//! Share-link resolution.
//!
//! Short links (`vm.tiktok.com/...`, `youtu.be/...`) are resolved to their
//! canonical URL before import. Providers are tried in order and the first one
//! that produces a URL wins. There is no backoff; a failing provider just
//! hands over to the next one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};
use serde_json::Value;
use tracing::{debug, warn};

use vscore_models::validate_http_url;

use crate::error::{ClientError, ClientResult};
use crate::metrics::record_resolve_attempt;

/// One way of turning a link into its canonical URL.
#[async_trait]
pub trait ResolveProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the provider had nothing to say about this link.
    async fn resolve(&self, url: &str) -> ClientResult<Option<String>>;
}

/// Follows HTTP redirects and reports where they end.
pub struct RedirectProvider {
    http: Client,
}

impl RedirectProvider {
    pub fn new(timeout: Duration) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(10))
            .user_agent(concat!("vscore-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ResolveProvider for RedirectProvider {
    fn name(&self) -> &str {
        "redirect"
    }

    async fn resolve(&self, url: &str) -> ClientResult<Option<String>> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::from_http_status(
                status.as_u16(),
                format!("redirect probe of {} failed", url),
            ));
        }

        let final_url = response.url().as_str();
        if final_url.trim_end_matches('/') == url.trim_end_matches('/') {
            return Ok(None);
        }
        Ok(Some(final_url.to_string()))
    }
}

/// Calls a JSON endpoint such as an unshortening service.
///
/// `template` contains a `{url}` placeholder that receives the url-encoded
/// link; `field` names the string field holding the answer.
pub struct JsonEndpointProvider {
    name: String,
    http: Client,
    template: String,
    field: String,
}

impl JsonEndpointProvider {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        field: impl Into<String>,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let template = template.into();
        if !template.contains("{url}") {
            return Err(ClientError::config(format!(
                "resolver template {:?} has no {{url}} placeholder",
                template
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self {
            name: name.into(),
            http,
            template,
            field: field.into(),
        })
    }

    fn request_url(&self, url: &str) -> String {
        self.template.replace("{url}", &urlencoding::encode(url))
    }
}

#[async_trait]
impl ResolveProvider for JsonEndpointProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, url: &str) -> ClientResult<Option<String>> {
        let response = self.http.get(self.request_url(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_http_status(status.as_u16(), body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::invalid_response(e.to_string()))?;

        Ok(body
            .get(&self.field)
            .and_then(Value::as_str)
            .filter(|s| validate_http_url(s).is_ok())
            .map(str::to_string))
    }
}

/// Tries each provider in order.
#[derive(Clone, Default)]
pub struct UrlResolver {
    providers: Vec<Arc<dyn ResolveProvider>>,
}

impl UrlResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn ResolveProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Default chain: configured JSON endpoints from `VSCORE_RESOLVER_ENDPOINTS`
    /// (comma separated templates answering `{"url": ...}`), then redirects.
    pub fn from_env(timeout: Duration) -> ClientResult<Self> {
        let mut resolver = Self::new();

        if let Ok(raw) = std::env::var("VSCORE_RESOLVER_ENDPOINTS") {
            for (i, template) in raw.split(',').map(str::trim).filter(|s| !s.is_empty()).enumerate() {
                let provider =
                    JsonEndpointProvider::new(format!("endpoint-{}", i + 1), template, "url", timeout)?;
                resolver = resolver.with_provider(Arc::new(provider));
            }
        }

        Ok(resolver.with_provider(Arc::new(RedirectProvider::new(timeout)?)))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve `url`, returning the first provider's answer.
    pub async fn resolve(&self, url: &str) -> ClientResult<String> {
        validate_http_url(url).map_err(ClientError::validation)?;

        for provider in &self.providers {
            match provider.resolve(url).await {
                Ok(Some(resolved)) => {
                    record_resolve_attempt(provider.name(), "resolved");
                    debug!(provider = provider.name(), %url, %resolved, "Resolved URL");
                    return Ok(resolved);
                }
                Ok(None) => {
                    record_resolve_attempt(provider.name(), "empty");
                    debug!(provider = provider.name(), %url, "Provider had no answer");
                }
                Err(e) => {
                    record_resolve_attempt(provider.name(), "error");
                    warn!(provider = provider.name(), %url, "URL resolution failed: {}", e);
                }
            }
        }

        Err(ClientError::Unresolvable(url.to_string()))
    }
}
