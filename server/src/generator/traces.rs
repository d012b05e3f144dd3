//! Inference trace synthesis.
//!
//! Every trace walks the same five-step pipeline (request, feature fetch,
//! inference, post-processing, response). An optional error index marks one
//! of the middle steps as failed with a canned error message.

use chrono::{DateTime, Utc};

use crate::rng::SeededRng;
use crate::time::add_ms;
use crate::types::{TraceStep, TraceStepKind, TraceStepStatus};

struct StepDraft {
    title: &'static str,
    kind: TraceStepKind,
    duration_ms: i64,
    status: TraceStepStatus,
    input_preview: &'static str,
    output_preview: &'static str,
    error_message: Option<&'static str>,
}

/// Build the five pipeline steps for a trace created at `created_at`.
///
/// Steps start back to back: each step begins where the previous one's
/// duration ends. `error_index`, when in `1..=3`, fails that step.
pub fn gen_trace_steps(
    rng: &mut SeededRng,
    created_at: DateTime<Utc>,
    error_index: Option<i64>,
) -> Vec<TraceStep> {
    let failed = |idx: i64| error_index == Some(idx);

    let drafts = [
        StepDraft {
            title: "Request",
            kind: TraceStepKind::Fetch,
            duration_ms: rng.random_int(2, 9),
            status: TraceStepStatus::Ok,
            input_preview: r#"{"query":"reset password","locale":"en-US"}"#,
            output_preview: r#"{"features":["q_len","has_verb","lang"]}"#,
            error_message: None,
        },
        StepDraft {
            title: "Feature fetch",
            kind: TraceStepKind::Fetch,
            duration_ms: rng.random_int(6, 28),
            status: if failed(1) {
                TraceStepStatus::Error
            } else {
                TraceStepStatus::Ok
            },
            input_preview: r#"{"userId":"u_49201","plan":"pro"}"#,
            output_preview: if failed(1) {
                "{}"
            } else {
                r#"{"sparse":[...],"dense":[...]}"#
            },
            error_message: failed(1).then_some("Timeout contacting feature store shard 03"),
        },
        StepDraft {
            title: "Model inference",
            kind: TraceStepKind::Inference,
            duration_ms: rng.random_int(18, 84),
            status: if failed(2) {
                TraceStepStatus::Error
            } else {
                TraceStepStatus::Ok
            },
            input_preview: r#"{"input":"<vector:768>"}"#,
            output_preview: if failed(2) {
                "{}"
            } else {
                r#"{"label":"account_access","p":0.87}"#
            },
            error_message: failed(2)
                .then_some("Tensor shape mismatch in attention block (expected 768)"),
        },
        StepDraft {
            title: "Post-processing",
            kind: TraceStepKind::Transform,
            duration_ms: rng.random_int(4, 20),
            status: if failed(3) {
                TraceStepStatus::Error
            } else {
                TraceStepStatus::Ok
            },
            input_preview: r#"{"label":"account_access","p":0.87}"#,
            output_preview: if failed(3) {
                "{}"
            } else {
                r#"{"decision":"route_to_flow","confidence":"high"}"#
            },
            error_message: failed(3).then_some(r#"Rule engine failed to parse expression: "p >> 0.8""#),
        },
        StepDraft {
            title: "Response",
            kind: TraceStepKind::Response,
            duration_ms: rng.random_int(1, 6),
            status: TraceStepStatus::Ok,
            input_preview: r#"{"decision":"route_to_flow","confidence":"high"}"#,
            output_preview: r#"{"status":200,"body":"ok"}"#,
            error_message: None,
        },
    ];

    let mut steps = Vec::with_capacity(drafts.len());
    let mut offset_ms = 0;
    for draft in drafts {
        let id = format!("step_{:x}", super::draw_u64(rng, 1e9));
        steps.push(TraceStep {
            id,
            title: draft.title.to_owned(),
            kind: draft.kind,
            started_at: add_ms(created_at, offset_ms),
            duration_ms: draft.duration_ms,
            status: draft.status,
            input_preview: draft.input_preview.to_owned(),
            output_preview: draft.output_preview.to_owned(),
            error_message: draft.error_message.map(str::to_owned),
        });
        offset_ms += draft.duration_ms;
    }
    steps
}
