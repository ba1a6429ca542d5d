//! Shared data models for the ViralScore job tracking client.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis jobs and their identifiers
//! - Job status and lifecycle ordering
//! - Submission requests (script, link import)

pub mod job;
pub mod job_status;
pub mod submission;

// Re-export common types
pub use job::{AnalysisJob, AnalysisResult, JobId, PayloadError, SequenceId};
pub use job_status::{JobStatus, UnknownStatus};
pub use submission::{validate_http_url, ImportLinkRequest, SubmitScriptRequest, MAX_SCRIPT_CHARS};
