//! Structured logs for a poll session.
//!
//! Every event carries `sequence_id`. Fetch failures also carry `attempt`,
//! `error_kind` and `retry_in_ms`, so an outage can be followed in JSON logs
//! without parsing messages.

use std::time::Duration;

use tracing::{debug, error, info, warn, Span};

use vscore_models::{AnalysisJob, JobStatus, SequenceId};

use crate::backoff::FailureStreak;

/// Logger bound to one polled job.
#[derive(Debug, Clone)]
pub struct PollLogger {
    sequence_id: String,
}

impl PollLogger {
    pub fn new(sequence_id: &SequenceId) -> Self {
        Self {
            sequence_id: sequence_id.to_string(),
        }
    }

    pub fn sequence_id(&self) -> &str {
        &self.sequence_id
    }

    /// Span covering the whole session.
    pub fn span(&self, interval: Duration) -> Span {
        tracing::info_span!(
            "poll_session",
            sequence_id = %self.sequence_id,
            interval_ms = interval.as_millis() as u64
        )
    }

    pub fn started(&self) {
        info!(sequence_id = %self.sequence_id, "Watching analysis status");
    }

    /// Non-terminal observations arrive every few seconds; keep them at debug.
    pub fn observed(&self, status: JobStatus, progress: Option<u8>) {
        debug!(
            sequence_id = %self.sequence_id,
            status = %status,
            progress = progress.map(u64::from),
            "Analysis still running"
        );
    }

    pub fn regressed(&self, previous: JobStatus, observed: JobStatus) {
        warn!(
            sequence_id = %self.sequence_id,
            previous = %previous,
            observed = %observed,
            "Backend reported a backwards status transition"
        );
    }

    pub fn terminal(&self, job: &AnalysisJob) {
        match job.status {
            JobStatus::Completed => info!(
                sequence_id = %self.sequence_id,
                overall_score = job.overall_score(),
                "Analysis completed"
            ),
            _ => info!(
                sequence_id = %self.sequence_id,
                reason = job.error_message.as_deref().unwrap_or("unspecified"),
                "Analysis failed on the backend"
            ),
        }
    }

    pub fn cancelled(&self) {
        debug!(sequence_id = %self.sequence_id, "Stopped watching");
    }

    /// A failed fetch. Errors the backend will not fix by itself (auth,
    /// unknown job) go to error level, outages to warn.
    pub fn fetch_failed(&self, attempt: u32, error_kind: &str, transient: bool, retry_in: Duration, error: &str) {
        let retry_in_ms = retry_in.as_millis() as u64;
        if transient {
            warn!(
                sequence_id = %self.sequence_id,
                attempt,
                error_kind,
                retry_in_ms,
                "Status fetch failed: {}", error
            );
        } else {
            error!(
                sequence_id = %self.sequence_id,
                attempt,
                error_kind,
                retry_in_ms,
                "Status fetch rejected: {}", error
            );
        }
    }

    /// Failures past the logging budget.
    pub fn fetch_failed_quietly(&self, attempt: u32, error_kind: &str, retry_in: Duration) {
        debug!(
            sequence_id = %self.sequence_id,
            attempt,
            error_kind,
            retry_in_ms = retry_in.as_millis() as u64,
            "Status fetch failed"
        );
    }

    pub fn going_quiet(&self, streak: &FailureStreak) {
        warn!(
            sequence_id = %self.sequence_id,
            failures = streak.len(),
            error_kind = streak.dominant_kind().unwrap_or("unknown"),
            "Backend still failing, further fetch errors logged at debug"
        );
    }

    pub fn recovered(&self, failures: u32, dominant_kind: &str) {
        info!(
            sequence_id = %self.sequence_id,
            failures,
            error_kind = dominant_kind,
            "Status fetch recovered"
        );
    }
}
