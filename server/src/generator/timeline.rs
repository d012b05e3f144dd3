//! Timeline event synthesis.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::rng::{EmptyInputError, SeededRng};
use crate::time::add_minutes;
use crate::types::{Severity, TimelineEvent, TimelineEventType};

use super::text::BRANCHES;

/// Generate a run's timeline: a commit at start, periodic checkpoints, and
/// the incident cluster (log spike one minute before, the alert itself, an
/// occasional mitigation note). Sorted ascending on return.
#[allow(clippy::cast_precision_loss)]
pub fn gen_timeline(
    rng: &mut SeededRng,
    start: DateTime<Utc>,
    duration_minutes: i64,
    incident_at_minute: i64,
    commit_hash: &str,
) -> Result<Vec<TimelineEvent>, EmptyInputError> {
    let mut events = Vec::new();
    let short_hash: String = commit_hash.chars().take(12).collect();

    events.push(TimelineEvent {
        ts: start,
        event_type: TimelineEventType::Commit,
        title: format!("code: {short_hash}"),
        severity: Some(Severity::Info),
        metadata: Some(json!({ "branch": rng.pick(&BRANCHES)? })),
    });

    let checkpoint_every = *rng.pick(&[10i64, 12, 15])?;
    let mut minute = checkpoint_every;
    while minute < duration_minutes {
        events.push(TimelineEvent {
            ts: add_minutes(start, minute as f64),
            event_type: TimelineEventType::Checkpoint,
            title: format!("checkpoint @ {minute}m"),
            severity: Some(Severity::Info),
            metadata: Some(json!({ "step": minute * 120 })),
        });
        minute += checkpoint_every;
    }

    let alert_severity = if rng.chance(0.5) {
        Severity::Critical
    } else {
        Severity::Warning
    };
    events.push(TimelineEvent {
        ts: add_minutes(start, incident_at_minute as f64),
        event_type: TimelineEventType::Alert,
        title: "loss spike + GPU underutilization".to_owned(),
        severity: Some(alert_severity),
        metadata: Some(json!({ "detector": "spike:v2", "windowMin": 5 })),
    });

    if rng.chance(0.45) {
        let offset = rng.random_int(2, 10);
        events.push(TimelineEvent {
            ts: add_minutes(start, (incident_at_minute + offset) as f64),
            event_type: TimelineEventType::Note,
            title: "auto-mitigation: reduced batch size".to_owned(),
            severity: Some(Severity::Info),
            metadata: Some(json!({ "action": "batch_size", "delta": "-50%" })),
        });
    }

    if rng.chance(0.35) {
        let deploy_at = rng.random_int(
            (duration_minutes as f64 * 0.15).floor() as i64,
            (duration_minutes as f64 * 0.65).floor() as i64,
        );
        events.push(TimelineEvent {
            ts: add_minutes(start, deploy_at as f64),
            event_type: TimelineEventType::Deploy,
            title: "linked deployment observed".to_owned(),
            severity: Some(Severity::Info),
            metadata: Some(json!({ "stage": rng.pick(&["canary", "ramp", "prod"])? })),
        });
    }

    events.push(TimelineEvent {
        ts: add_minutes(start, (incident_at_minute - 1) as f64),
        event_type: TimelineEventType::LogSpike,
        title: "log volume spike".to_owned(),
        severity: Some(Severity::Warning),
        metadata: Some(json!({ "linesPerMin": rng.random_int(300, 1200) })),
    });

    events.sort_by_key(|event| event.ts);
    Ok(events)
}
