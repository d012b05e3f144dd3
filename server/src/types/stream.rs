//! Frames of the per-run live event stream.
//!
//! One JSON frame per event, tagged by `type`. The synthetic forced
//! disconnect closes with a distinct code/reason so clients can tell a
//! simulated drop from a real failure.

use serde::{Deserialize, Serialize};

use super::run::RunStatus;
use super::telemetry::{LogLine, MetricPoint, TimelineEvent};

/// Close code used for the scheduled synthetic disconnect (Service Restart).
pub const SYNTHETIC_DISCONNECT_CODE: u16 = 1012;
/// Close reason paired with [`SYNTHETIC_DISCONNECT_CODE`].
pub const SYNTHETIC_DISCONNECT_REASON: &str = "Synthetic disconnect (demo)";

/// One event on a run subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RunStreamEvent {
    /// Emitted once, immediately on subscribe.
    Status { run_id: String, status: RunStatus },
    LogLine { run_id: String, line: LogLine },
    MetricPoint { run_id: String, point: MetricPoint },
    TimelineEvent { run_id: String, event: TimelineEvent },
}

impl RunStreamEvent {
    /// The run this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::Status { run_id, .. }
            | Self::LogLine { run_id, .. }
            | Self::MetricPoint { run_id, .. }
            | Self::TimelineEvent { run_id, .. } => run_id,
        }
    }
}
