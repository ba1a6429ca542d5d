//! Delay schedule between fetches and failure log suppression.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::PollerConfig;

/// Computes the wait before the next fetch.
///
/// With no failures (or backoff disabled) the wait is the plain interval.
/// After `n` consecutive failures it is `interval * 2^(n-1)`, capped at
/// `max_backoff`. Polling never stops because of failures.
#[derive(Debug, Clone)]
pub struct Backoff {
    interval: Duration,
    max_backoff: Duration,
    enabled: bool,
}

impl Backoff {
    pub fn from_config(config: &PollerConfig) -> Self {
        Self {
            interval: config.interval,
            max_backoff: config.max_backoff,
            enabled: config.backoff_enabled,
        }
    }

    /// Delay before the next fetch. A server-provided `retry_after` is
    /// honored up to `max_backoff`.
    pub fn delay(&self, consecutive_failures: u32, retry_after: Option<Duration>) -> Duration {
        let base = if !self.enabled || consecutive_failures <= 1 {
            self.interval
        } else {
            let factor = 2u32.saturating_pow(consecutive_failures - 1);
            self.interval.saturating_mul(factor).min(self.max_backoff)
        };

        match retry_after {
            Some(after) => base.max(after.min(self.max_backoff)),
            None => base,
        }
    }
}

/// What to do with the log line for a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureLog {
    /// Within the logging budget
    Log,
    /// First failure past the budget: announce that logging goes quiet
    GoQuiet,
    /// Past the budget
    Quiet,
}

/// The current run of consecutive failed fetches, by error kind.
///
/// An outage keeps failing every few seconds for as long as it lasts, so only
/// the first `log_budget` failures of a streak are logged in full.
#[derive(Debug, Default)]
pub struct FailureStreak {
    by_kind: BTreeMap<&'static str, u32>,
    len: u32,
    log_budget: u32,
}

/// A streak that ended with a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedStreak {
    pub failures: u32,
    pub dominant_kind: &'static str,
    /// Whether failures were being logged quietly when it ended
    pub was_quiet: bool,
}

impl FailureStreak {
    pub fn new(log_budget: u32) -> Self {
        Self {
            log_budget,
            ..Self::default()
        }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Failures of `kind` in the current streak.
    pub fn count_of(&self, kind: &str) -> u32 {
        self.by_kind.get(kind).copied().unwrap_or(0)
    }

    /// Most frequent error kind of the streak; ties go to the first by name.
    pub fn dominant_kind(&self) -> Option<&'static str> {
        self.by_kind
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(kind, _)| *kind)
    }

    pub fn record_failure(&mut self, kind: &'static str) -> FailureLog {
        self.len += 1;
        *self.by_kind.entry(kind).or_insert(0) += 1;

        match self.len.cmp(&(self.log_budget + 1)) {
            std::cmp::Ordering::Less => FailureLog::Log,
            std::cmp::Ordering::Equal => FailureLog::GoQuiet,
            std::cmp::Ordering::Greater => FailureLog::Quiet,
        }
    }

    /// Close the streak. `None` if there was nothing to recover from.
    pub fn record_success(&mut self) -> Option<EndedStreak> {
        let dominant_kind = self.dominant_kind()?;
        let ended = EndedStreak {
            failures: self.len,
            dominant_kind,
            was_quiet: self.len > self.log_budget,
        };
        self.by_kind.clear();
        self.len = 0;
        Some(ended)
    }
}
