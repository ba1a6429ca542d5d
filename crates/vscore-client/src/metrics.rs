//! Backend request metrics.
//!
//! Recorded through the `metrics` facade; the binary decides whether a
//! recorder is installed.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total backend requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "vscore_api_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vscore_api_latency_seconds";

    /// URL resolution attempts by provider and outcome.
    pub const RESOLVE_ATTEMPTS_TOTAL: &str = "vscore_resolve_attempts_total";
}

/// Record metrics for a completed backend request.
pub fn record_request(operation: &str, status: &str, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record one provider attempt during URL resolution.
pub fn record_resolve_attempt(provider: &str, outcome: &str) {
    counter!(
        names::RESOLVE_ATTEMPTS_TOTAL,
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
        assert!(names::RESOLVE_ATTEMPTS_TOTAL.starts_with("vscore_"));
    }
}
