//! What the user should see for each poll event.
//!
//! Three situations must stay distinguishable: the job is still being
//! worked on, the client cannot reach the backend right now, and the
//! analysis itself failed.

use std::fmt;

use serde::Serialize;

use vscore_models::{AnalysisJob, JobStatus};

use crate::session::{PollEvent, PollOutcome};

/// User-facing rendering of the current poll state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DisplayState {
    /// Job is queued or running on the backend.
    Processing {
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<u8>,
    },
    /// A status fetch failed; polling continues.
    Retrying {
        attempt: u32,
        /// Error kind label, e.g. `network`, `not_found`, `unauthorized`
        kind: String,
        retry_in_ms: u64,
        reason: String,
    },
    Completed {
        #[serde(skip_serializing_if = "Option::is_none")]
        overall_score: Option<f64>,
    },
    /// The analysis failed on the backend.
    AnalysisFailed { message: String },
    Cancelled,
}

const DEFAULT_FAILURE_MESSAGE: &str = "Analysis failed. Please try submitting again.";

impl DisplayState {
    pub fn from_event(event: &PollEvent) -> Self {
        match event {
            PollEvent::Observed(job) | PollEvent::Terminal(job) => Self::from_job(job),
            PollEvent::Retrying {
                error,
                error_kind,
                consecutive_failures,
                next_attempt_in,
            } => DisplayState::Retrying {
                attempt: *consecutive_failures,
                kind: (*error_kind).to_string(),
                retry_in_ms: next_attempt_in.as_millis() as u64,
                reason: error.clone(),
            },
        }
    }

    pub fn from_outcome(outcome: &PollOutcome) -> Self {
        match outcome.job() {
            Some(job) => Self::from_job(job),
            None => DisplayState::Cancelled,
        }
    }

    fn from_job(job: &AnalysisJob) -> Self {
        match job.status {
            JobStatus::Completed => DisplayState::Completed {
                overall_score: job.overall_score(),
            },
            JobStatus::Failed => DisplayState::AnalysisFailed {
                message: job
                    .error_message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            },
            status => DisplayState::Processing {
                status,
                progress: job.progress,
            },
        }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayState::Processing { status, progress: Some(p) } => {
                write!(f, "Still working ({}, {}%)", status, p)
            }
            DisplayState::Processing { status, progress: None } => {
                write!(f, "Still working ({})", status)
            }
            DisplayState::Retrying {
                attempt,
                kind,
                retry_in_ms,
                ..
            } => write!(
                f,
                "{}, retrying in {} (attempt {})",
                retry_headline(kind),
                FormatDelay(*retry_in_ms),
                attempt
            ),
            DisplayState::Completed { overall_score: Some(score) } => {
                write!(f, "Analysis complete, viral score {:.0}", score)
            }
            DisplayState::Completed { overall_score: None } => write!(f, "Analysis complete"),
            DisplayState::AnalysisFailed { message } => write!(f, "Analysis failed: {}", message),
            DisplayState::Cancelled => write!(f, "Stopped watching"),
        }
    }
}

/// What went wrong, in words that do not blame the network for a 404.
fn retry_headline(kind: &str) -> &'static str {
    match kind {
        "not_found" => "Analysis not found yet",
        "unauthorized" | "credential" => "Not authorized, check your API token",
        "rate_limited" => "Backend is throttling requests",
        "server" => "Backend error",
        "invalid_response" => "Unexpected response from backend",
        "network" | "timeout" => "Connection problem",
        _ => "Status request rejected",
    }
}

struct FormatDelay(u64);

impl fmt::Display for FormatDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0;
        if ms < 1000 {
            write!(f, "{}ms", ms)
        } else if ms % 1000 == 0 {
            write!(f, "{}s", ms / 1000)
        } else {
            write!(f, "{:.1}s", ms as f64 / 1000.0)
        }
    }
}
