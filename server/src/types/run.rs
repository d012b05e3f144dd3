use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::telemetry::TimelineEvent;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl RunStatus {
    /// Whether a run in this state has finished executing.
    ///
    /// `ended_at` is present iff this returns true.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Checkpoint,
    Report,
    Plot,
}

/// A file produced by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub size_bytes: i64,
}

/// Descriptive metadata attached to a run at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    pub dataset: DatasetMeta,
    pub compute: ComputeMeta,
    pub code: CodeMeta,
    pub cluster: ClusterMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMeta {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeMeta {
    pub gpu_type: String,
    pub gpus: i64,
    pub spot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeMeta {
    pub commit_hash: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMeta {
    pub name: String,
    pub region: String,
}

/// A single training run.
///
/// # Invariants
///
/// - Belongs to exactly one experiment.
/// - `ended_at` is present iff `status.is_terminal()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub experiment_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub config_version_id: String,
    /// Last observed value per metric series name.
    pub metrics_summary: BTreeMap<String, f64>,
    pub artifacts: Vec<Artifact>,
    pub meta: RunMeta,
}

/// A run bundled with its timeline, as returned by the run detail query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunWithTimeline {
    #[serde(flatten)]
    pub run: Run,
    pub timeline: Vec<TimelineEvent>,
}
