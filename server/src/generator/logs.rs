//! Log line synthesis.

use chrono::{DateTime, Utc};

use crate::rng::{EmptyInputError, SeededRng};
use crate::time::add_ms;
use crate::types::{LogLevel, LogLine};

use super::text::{LOG_SOURCES, format_log_message, pick_log_level};

/// Generate a run's full log: jittered timestamps over the run duration, a
/// level distribution biased inside the ±2.5 minute incident window, and an
/// occasional gradient-overflow follow-up line. Sorted ascending on return.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn gen_logs(
    rng: &mut SeededRng,
    start: DateTime<Utc>,
    duration_minutes: i64,
    incident_at_minute: i64,
    commit_hash: &str,
) -> Result<Vec<LogLine>, EmptyInputError> {
    let total_ms = duration_minutes as f64 * 60_000.0;
    let line_count = rng.random_int(1600, 3200);
    let base_interval_ms = total_ms / line_count as f64;
    let incident_minute = incident_at_minute as f64;

    let mut lines = Vec::with_capacity(usize::try_from(line_count).unwrap_or(0));

    for i in 0..line_count {
        let jitter = rng.random_float(-0.35, 0.35) * base_interval_ms;
        let at = add_ms(start, (i as f64 * base_interval_ms + jitter) as i64);
        let minutes = (at - start).num_milliseconds() as f64 / 60_000.0;

        let in_incident_window = (minutes - incident_minute).abs() < 2.5;
        let level = pick_log_level(rng, in_incident_window);
        let source = *rng.pick(&LOG_SOURCES)?;
        let message = format_log_message(rng, level, source, commit_hash, usize::try_from(i).unwrap_or(0))?;

        lines.push(LogLine {
            ts: at,
            level,
            source: source.to_owned(),
            message,
        });

        // A burst of overflow retries clusters around the incident.
        if in_incident_window && rng.chance(0.08) {
            let follow_up_at = add_ms(at, rng.random_int(20, 1800));
            let level = *rng.pick(&[LogLevel::Warn, LogLevel::Error])?;
            lines.push(LogLine {
                ts: follow_up_at,
                level,
                source: "trainer".to_owned(),
                message: "Gradient overflow detected; scaling down loss scale and retrying step."
                    .to_owned(),
            });
        }
    }

    lines.sort_by_key(|line| line.ts);
    Ok(lines)
}
