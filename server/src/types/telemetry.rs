//! Per-run telemetry: log lines, metric points, timeline events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log severity level, most to least severe: ERROR, WARN, INFO, DEBUG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One line of run output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub ts: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub source: String,
}

/// One sample of a named metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPoint {
    pub ts: DateTime<Utc>,
    pub name: String,
    pub value: f64,
}

/// Kind of a timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    Deploy,
    Checkpoint,
    Alert,
    LogSpike,
    Commit,
    Note,
}

/// Severity attached to timeline events and incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// A single annotated moment on a run's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: TimelineEventType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
