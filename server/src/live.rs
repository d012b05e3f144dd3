//! Live event simulation for run subscriptions.
//!
//! Each WebSocket subscription owns one [`LiveFeed`]. The feed is seeded from
//! the dataset seed, the run id, and a per-process subscription counter, so a
//! given subscription's event sequence is reproducible while two concurrent
//! subscriptions to the same run still diverge.
//!
//! Metric values random-walk from the last historical point of each series,
//! keeping the live stream visually continuous with the stored data.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::generator::metrics::METRIC_NAMES;
use crate::rng::SeededRng;
use crate::types::{
    LogLevel, LogLine, MetricPoint, RunStatus, RunStreamEvent, Severity, TimelineEvent,
    TimelineEventType,
};

/// Per-subscription event generator.
#[derive(Debug)]
pub struct LiveFeed {
    run_id: String,
    rng: SeededRng,
    step: u64,
    metric_values: BTreeMap<String, f64>,
}

impl LiveFeed {
    /// Build a feed for one subscription.
    ///
    /// `last_values` carries the final historical value per metric series;
    /// series without history start from a fixed baseline.
    #[must_use]
    pub fn new(
        seed: &str,
        run_id: &str,
        subscription: u64,
        last_values: &BTreeMap<String, f64>,
    ) -> Self {
        let mut metric_values = BTreeMap::new();
        for name in METRIC_NAMES {
            let value = last_values
                .get(name)
                .copied()
                .unwrap_or_else(|| baseline_metric(name));
            metric_values.insert(name.to_owned(), value);
        }
        Self {
            run_id: run_id.to_owned(),
            rng: SeededRng::new(&format!("{seed}:{run_id}:{subscription}")),
            step: 0,
            metric_values,
        }
    }

    /// The status event sent immediately on subscription open.
    #[must_use]
    pub fn status_event(&self, status: RunStatus) -> RunStreamEvent {
        RunStreamEvent::Status {
            run_id: self.run_id.clone(),
            status,
        }
    }

    /// Delay before the next tick.
    pub fn tick_delay(&mut self) -> Duration {
        let ms = self.rng.random_int(500, 1500);
        Duration::from_millis(u64::try_from(ms).unwrap_or(500))
    }

    /// Produce the next event: 50% log line, 40% metric point, 10% timeline.
    pub fn next_event(&mut self, now: DateTime<Utc>) -> RunStreamEvent {
        self.step += 1;
        let draw = self.rng.next_f64();
        if draw < 0.5 {
            RunStreamEvent::LogLine {
                run_id: self.run_id.clone(),
                line: self.next_log_line(now),
            }
        } else if draw < 0.9 {
            RunStreamEvent::MetricPoint {
                run_id: self.run_id.clone(),
                point: self.next_metric_point(now),
            }
        } else {
            RunStreamEvent::TimelineEvent {
                run_id: self.run_id.clone(),
                event: self.next_timeline_event(now),
            }
        }
    }

    fn next_metric_point(&mut self, now: DateTime<Utc>) -> MetricPoint {
        let name = (*self.rng.pick(&METRIC_NAMES).unwrap_or(&"loss")).to_owned();
        let prev = self
            .metric_values
            .get(&name)
            .copied()
            .unwrap_or_else(|| baseline_metric(&name));
        let value = next_metric_value(&mut self.rng, &name, prev);
        self.metric_values.insert(name.clone(), value);
        MetricPoint {
            ts: now,
            name,
            value,
        }
    }

    fn next_log_line(&mut self, now: DateTime<Utc>) -> LogLine {
        let level = self.pick_level();
        let loss = self.metric_values.get("loss").copied().unwrap_or(0.7);
        let accuracy = self.metric_values.get("accuracy").copied().unwrap_or(0.82);

        let (source, message) = match level {
            LogLevel::Info => {
                let lr = 0.0005 + (self.step_f64() / 40.0).sin() * 0.000_08;
                (
                    "trainer",
                    format!(
                        "[trainer] step={:06} loss={loss:.4} acc={accuracy:.3} lr={lr:.6}",
                        self.step
                    ),
                )
            }
            LogLevel::Warn => {
                let temp = 70 + self.rng.random_int(0, 21);
                ("system", format!("[system] gpu throttling: temp={temp}C"))
            }
            LogLevel::Error => (
                "trainer",
                "[trainer] checkpoint write failed: EIO (simulated)".to_owned(),
            ),
            LogLevel::Debug => {
                let pending = self.rng.random_int(0, 17);
                let running = self.rng.random_int(1, 6);
                (
                    "trainer",
                    format!("[trainer] scheduler tick: pending={pending} running={running}"),
                )
            }
        };

        LogLine {
            ts: now,
            level,
            source: source.to_owned(),
            message,
        }
    }

    /// The tail of every 40-step cycle is a "spike" with elevated error and
    /// warning probability.
    fn pick_level(&mut self) -> LogLevel {
        let x = self.rng.next_f64();
        let in_spike = self.step % 40 >= 34;
        if in_spike && x < 0.12 {
            LogLevel::Error
        } else if in_spike && x < 0.35 {
            LogLevel::Warn
        } else if x < 0.01 {
            LogLevel::Error
        } else if x < 0.08 {
            LogLevel::Warn
        } else if x < 0.76 {
            LogLevel::Info
        } else {
            LogLevel::Debug
        }
    }

    fn next_timeline_event(&self, now: DateTime<Utc>) -> TimelineEvent {
        match self.step % 3 {
            0 => TimelineEvent {
                ts: now,
                event_type: TimelineEventType::Checkpoint,
                title: "checkpoint saved".to_owned(),
                severity: Some(Severity::Info),
                metadata: Some(json!({ "step": self.step })),
            },
            1 => TimelineEvent {
                ts: now,
                event_type: TimelineEventType::Alert,
                title: "anomaly detected: p95 latency drift".to_owned(),
                severity: Some(Severity::Warning),
                metadata: Some(json!({ "step": self.step })),
            },
            _ => TimelineEvent {
                ts: now,
                event_type: TimelineEventType::LogSpike,
                title: "log spike (stream)".to_owned(),
                severity: Some(Severity::Warning),
                metadata: Some(json!({ "linesPerMin": 900 })),
            },
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn step_f64(&self) -> f64 {
        self.step as f64
    }
}

fn baseline_metric(name: &str) -> f64 {
    match name {
        "loss" => 0.7,
        "accuracy" => 0.82,
        "throughput" => 420.0,
        "gpu_util" => 88.0,
        _ => 0.0,
    }
}

/// Bounded random walk with series-specific step sizes and clamps.
fn next_metric_value(rng: &mut SeededRng, name: &str, prev: f64) -> f64 {
    let noise = (rng.next_f64() - 0.5) * 2.0;
    match name {
        "loss" => noise.mul_add(0.02, prev - 0.003).max(0.02),
        "accuracy" => noise.mul_add(0.004, prev + 0.001).clamp(0.0, 1.0),
        "throughput" => noise.mul_add(12.0, prev).max(1.0),
        "gpu_util" => noise.mul_add(1.8, prev).clamp(0.0, 100.0),
        _ => prev,
    }
}
