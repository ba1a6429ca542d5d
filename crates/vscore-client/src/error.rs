//! Client error types.

use thiserror::Error;

/// Result type for backend client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur talking to the analysis backend.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Could not resolve URL: {0}")]
    Unresolvable(String),
}

/// Fallback wait when a 429 carries no Retry-After.
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

impl ClientError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match status {
            401 | 403 => Self::Unauthorized(msg),
            404 => Self::NotFound(msg),
            429 => Self::RateLimited(DEFAULT_RATE_LIMIT_MS),
            500..=599 => Self::Server(status, msg),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, msg)),
        }
    }

    /// HTTP status this error corresponds to, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            ClientError::Timeout(_) => Some(408),
            ClientError::NotFound(_) => Some(404),
            ClientError::Unauthorized(_) => Some(401),
            ClientError::RateLimited(_) => Some(429),
            ClientError::Server(status, _) => Some(*status),
            _ => None,
        }
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ClientError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// True for failures that the next poll may not see again: transport
    /// problems, timeouts, throttling, 5xx and garbled payloads.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_)
                | ClientError::Timeout(_)
                | ClientError::RateLimited(_)
                | ClientError::Server(..)
                | ClientError::InvalidResponse(_)
                | ClientError::Json(_)
        )
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Network(_) => "network",
            ClientError::Timeout(_) => "timeout",
            ClientError::NotFound(_) => "not_found",
            ClientError::Unauthorized(_) => "unauthorized",
            ClientError::RateLimited(_) => "rate_limited",
            ClientError::Server(..) => "server",
            ClientError::RequestFailed(_) => "request_failed",
            ClientError::InvalidResponse(_) | ClientError::Json(_) => "invalid_response",
            ClientError::Validation(_) => "validation",
            ClientError::Config(_) => "config",
            ClientError::Credential(_) => "credential",
            ClientError::Unresolvable(_) => "unresolvable",
        }
    }
}
