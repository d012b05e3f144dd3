//! Model registry entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered model family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Promotion stage of a model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVersionStage {
    Draft,
    Staging,
    Production,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalSummary {
    pub accuracy: f64,
    pub latency_p95_ms: f64,
    pub robustness: f64,
}

/// A concrete version of a model.
///
/// # Invariants
///
/// - `best_run_id` references a run that exists in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersion {
    pub id: String,
    pub model_id: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub best_run_id: String,
    pub eval_summary: EvalSummary,
    pub stage: ModelVersionStage,
}
