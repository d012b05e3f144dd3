//! Inference request traces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStepKind {
    Fetch,
    Inference,
    Transform,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStepStatus {
    Ok,
    Error,
}

/// One stage of serving a single inference request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub id: String,
    pub title: String,
    pub kind: TraceStepKind,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: TraceStepStatus,
    pub input_preview: String,
    pub output_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// End-to-end record of one request through a model version.
///
/// # Invariants
///
/// - `steps` are ordered by `started_at`.
/// - The synthetic generator marks at most one step as `error`; subsequent
///   steps still execute and are recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub request_id: String,
    pub model_version_id: String,
    pub steps: Vec<TraceStep>,
    pub tags: Vec<String>,
}
