//! Deployment rollout entities.
//!
//! A deployment walks the stages canary → ramp → prod and never backwards.
//! `rolled_back` is a terminal status; an incident forces `paused` without
//! touching the stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::telemetry::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStage {
    Canary,
    Ramp,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Running,
    Paused,
    Succeeded,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutStepStatus {
    Pending,
    Active,
    Done,
    Failed,
}

/// One step of the rollout plan (canary, ramp, promote).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStep {
    pub id: String,
    pub title: String,
    pub status: RolloutStepStatus,
}

/// Severity of a deployment incident. Reuses the timeline severity scale
/// minus `info`: incidents are never informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSeverity {
    Warning,
    Critical,
}

impl From<IncidentSeverity> for Severity {
    fn from(severity: IncidentSeverity) -> Self {
        match severity {
            IncidentSeverity::Warning => Self::Warning,
            IncidentSeverity::Critical => Self::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub severity: IncidentSeverity,
}

/// A rollout of one model version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub model_version_id: String,
    pub stage: DeploymentStage,
    pub status: DeploymentStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub rollout_steps: Vec<RolloutStep>,
    /// Most recent incident first.
    pub incidents: Vec<Incident>,
}
