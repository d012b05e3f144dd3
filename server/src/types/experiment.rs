use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named bucket of training runs.
///
/// # Invariants
///
/// - `id` is unique across all experiments.
/// - `created_at` never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub description: String,
}
