//! Poller configuration.

use std::time::Duration;

/// Poll session configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between the end of one fetch and the start of the next
    pub interval: Duration,
    /// Per-fetch timeout; never longer than `interval`
    pub request_timeout: Duration,
    /// Back off exponentially while fetches keep failing
    pub backoff_enabled: bool,
    /// Upper bound for the backed-off delay
    pub max_backoff: Duration,
    /// Consecutive failures logged at warn level before suppression
    pub max_logged_failures: u32,
}

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            request_timeout: Duration::from_secs(5),
            backoff_enabled: true,
            max_backoff: Duration::from_secs(60),
            max_logged_failures: 3,
        }
    }
}

impl PollerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let interval = Duration::from_secs(
            std::env::var("VSCORE_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&secs: &u64| secs > 0)
                .unwrap_or(5),
        );

        let request_timeout = Duration::from_secs(
            std::env::var("VSCORE_POLL_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        );

        Self {
            interval,
            request_timeout,
            backoff_enabled: std::env::var("VSCORE_POLL_BACKOFF")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            max_backoff: Duration::from_secs(
                std::env::var("VSCORE_POLL_MAX_BACKOFF_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_logged_failures: std::env::var("VSCORE_POLL_MAX_LOGGED_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
        }
        .normalized()
    }

    /// Set the poll interval; the request timeout is clamped to it. A zero
    /// interval falls back to the default.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self.normalized()
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self.normalized()
    }

    pub fn with_backoff(mut self, enabled: bool, max_backoff: Duration) -> Self {
        self.backoff_enabled = enabled;
        self.max_backoff = max_backoff;
        self.normalized()
    }

    /// A hung fetch must not hold up the next tick, and a zero interval
    /// would poll in a tight loop.
    fn normalized(mut self) -> Self {
        if self.interval.is_zero() {
            self.interval = DEFAULT_INTERVAL;
        }
        if self.request_timeout.is_zero() || self.request_timeout > self.interval {
            self.request_timeout = self.interval;
        }
        if self.max_backoff < self.interval {
            self.max_backoff = self.interval;
        }
        self
    }
}
