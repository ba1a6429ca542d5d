//! Analysis job identifiers and the job snapshot returned by the backend.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::JobStatus;

/// Opaque backend-assigned job identifier.
///
/// Like [`SequenceId`], accepted as a JSON string or number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-facing sequential identifier. The status endpoint is keyed by it.
///
/// The backend sends it either as a JSON number or a string; both decode to
/// the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct SequenceId(pub String);

impl SequenceId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SequenceId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Identifier sent either as a JSON string or number.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(Number),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawId::deserialize(deserializer).map(|raw| JobId(raw.into_string()))
    }
}

impl<'de> Deserialize<'de> for SequenceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawId::deserialize(deserializer).map(|raw| SequenceId(raw.into_string()))
    }
}

/// Result payload of a completed analysis.
///
/// The shape is owned by the backend (scores, insights, optimized assets);
/// only a few convenience accessors are typed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AnalysisResult(
    #[schemars(with = "std::collections::BTreeMap<String, Value>")] pub Map<String, Value>,
);

impl AnalysisResult {
    /// Look up a raw result field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Overall viral-potential score, if the backend reported one.
    pub fn overall_score(&self) -> Option<f64> {
        self.get("overall_score").and_then(Value::as_f64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Snapshot of one submitted content analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisJob {
    /// Backend job ID. Status payloads may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JobId>,
    /// Display identifier used for polling
    pub sequence_id: SequenceId,
    /// Current status (backend-owned)
    pub status: JobStatus,
    /// Present only when `status == completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    /// Failure reason reported with `status == failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Progress hint (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Errors decoding a job status payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("status payload is not a JSON object")]
    NotAnObject,

    #[error("status payload has no sequence id")]
    MissingSequenceId,

    #[error("invalid status payload: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Envelope keys of the status payload. Everything else is result data.
///
/// Only `status` is authoritative. The other envelope fields are hints and
/// decode to `None` when the backend sends a shape we do not understand.
#[derive(Deserialize)]
struct StatusEnvelope {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<JobId>,
    #[serde(default, alias = "sequenceId", deserialize_with = "lenient")]
    sequence_id: Option<SequenceId>,
    status: JobStatus,
    #[serde(default, alias = "error", deserialize_with = "lenient_message")]
    error_message: Option<String>,
    #[serde(default, deserialize_with = "lenient_progress")]
    progress: Option<f64>,
    #[serde(default, alias = "updatedAt", deserialize_with = "lenient_timestamp")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Plain string, or `{"message": ...}` / `{"detail": ...}` error objects.
fn lenient_message<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let message = match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Object(map) => ["message", "detail"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str).map(str::to_string)),
        _ => None,
    };
    Ok(message)
}

fn lenient_progress<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let progress = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    };
    Ok(progress.filter(|p: &f64| p.is_finite()))
}

/// RFC 3339, naive ISO 8601 (taken as UTC), or unix seconds.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let at = match Value::deserialize(deserializer)? {
        Value::String(s) => parse_timestamp(&s),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    };
    Ok(at)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

impl AnalysisJob {
    /// Decode a `{ status, ...resultFields }` payload.
    ///
    /// `requested` fills in the sequence id when the payload omits it. Result
    /// fields are only kept when the job is completed.
    pub fn from_payload(value: Value, requested: Option<&SequenceId>) -> Result<Self, PayloadError> {
        if !value.is_object() {
            return Err(PayloadError::NotAnObject);
        }

        let envelope: StatusEnvelope = serde_json::from_value(value)?;

        let sequence_id = envelope
            .sequence_id
            .or_else(|| requested.cloned())
            .ok_or(PayloadError::MissingSequenceId)?;

        let result = match envelope.status {
            JobStatus::Completed => Some(AnalysisResult(envelope.rest)),
            _ => None,
        };

        Ok(Self {
            id: envelope.id,
            sequence_id,
            status: envelope.status,
            result,
            error_message: envelope.error_message,
            progress: envelope.progress.map(|p| p.clamp(0.0, 100.0) as u8),
            updated_at: envelope.updated_at,
        })
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Overall score of a completed job.
    pub fn overall_score(&self) -> Option<f64> {
        self.result.as_ref().and_then(AnalysisResult::overall_score)
    }
}
