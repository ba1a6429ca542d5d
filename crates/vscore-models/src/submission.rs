//! Requests that create a new analysis job.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Maximum script length accepted by the backend.
pub const MAX_SCRIPT_CHARS: usize = 20_000;

/// Submit a written script for scoring.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubmitScriptRequest {
    pub script: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SubmitScriptRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Validate the request.
    pub fn validate(&self) -> Result<(), String> {
        if self.script.trim().is_empty() {
            return Err("Script must not be empty".to_string());
        }

        let chars = self.script.chars().count();
        if chars > MAX_SCRIPT_CHARS {
            return Err(format!(
                "Script is {} characters, maximum is {}",
                chars, MAX_SCRIPT_CHARS
            ));
        }

        Ok(())
    }
}

/// Import a video by link (TikTok, Reels, Shorts, ...).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImportLinkRequest {
    pub url: String,
}

impl ImportLinkRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Validate the request.
    pub fn validate(&self) -> Result<(), String> {
        validate_http_url(&self.url).map(|_| ())
    }
}

/// Parse `raw` and require an absolute http(s) URL with a host.
pub fn validate_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("Invalid URL {:?}: {}", raw, e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("Unsupported URL scheme: {}", other)),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(format!("URL has no host: {}", raw));
    }

    Ok(url)
}
