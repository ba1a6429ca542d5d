//! Analysis job status as reported by the backend.
//!
//! Status is backend-driven and monotonic. The client only ever reads it.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Analysis job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued waiting for a worker
    #[default]
    Queued,
    /// Content is being downloaded/transcoded
    Processing,
    /// AI scoring is running
    Analyzing,
    /// Analysis completed, result available
    Completed,
    /// Analysis failed on the backend
    Failed,
}

/// Returned when a status string is not one of the five known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job status: {0:?}")]
pub struct UnknownStatus(pub String);

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Returns true if the job is still moving through the pipeline.
    pub fn is_in_progress(&self) -> bool {
        !self.is_terminal()
    }

    /// Position in the lifecycle. Both terminal states share the last rank.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Analyzing => 2,
            JobStatus::Completed | JobStatus::Failed => 3,
        }
    }

    /// True if moving from `previous` to `self` goes backwards in the lifecycle.
    ///
    /// Any move away from a terminal state counts, including completed -> failed.
    pub fn is_regression_from(&self, previous: JobStatus) -> bool {
        if previous.is_terminal() {
            return *self != previous;
        }
        self.rank() < previous.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "analyzing" => Ok(JobStatus::Analyzing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::Analyzing.is_terminal());
        assert!(JobStatus::Analyzing.is_in_progress());
    }

    #[test]
    fn test_parse_round_trips_wire_names() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Analyzing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = "stale".parse::<JobStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("stale".into()));
        assert!(serde_json::from_str::<JobStatus>("\"COMPLETED\"").is_err());
    }

    #[test]
    fn test_regression_detection() {
        assert!(!JobStatus::Processing.is_regression_from(JobStatus::Queued));
        assert!(!JobStatus::Analyzing.is_regression_from(JobStatus::Analyzing));
        assert!(JobStatus::Queued.is_regression_from(JobStatus::Analyzing));
        assert!(JobStatus::Processing.is_regression_from(JobStatus::Completed));
        assert!(JobStatus::Failed.is_regression_from(JobStatus::Completed));
        assert!(!JobStatus::Failed.is_regression_from(JobStatus::Failed));
    }
}
