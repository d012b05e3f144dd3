//! Name pools, log templates, and message formatting.
//!
//! The placeholder set and value ranges here are load-bearing: fingerprinting
//! groups lines by their normalized shape, so changing a template or the
//! substitution order changes how lines cluster.

use std::sync::LazyLock;

use regex::Regex;

use crate::rng::{EmptyInputError, SeededRng};
use crate::types::LogLevel;

pub const OWNERS: [&str; 8] = ["deb", "sara", "mika", "chen", "ravi", "sam", "noor", "jules"];

pub const EXPERIMENT_NAMES: [&str; 9] = [
    "Ranker: cold-start stabilization",
    "Fraud: graph features ablation",
    "Support: intent finetune sweep",
    "Vision: robustness eval harness",
    "Search: latency-aware distillation",
    "RAG: retrieval scorer v3",
    "Ads: calibration reliability",
    "Safety: toxicity classifier refresh",
    "Infra: throughput tuning",
];

pub const EXPERIMENT_TAGS: [&str; 6] = ["baseline", "sweep", "ablation", "eval", "stability", "perf"];

pub const CONFIG_TAGS: [&str; 5] = ["baseline", "ablation", "sweep", "stability", "eval"];

pub const DATASETS: [&str; 3] = ["support_intents_v2", "ranker_clicks_2025Q2", "fraud_graph_v5"];

pub const GPU_TYPES: [&str; 3] = ["A100-80GB", "H100-80GB", "L40S"];

pub const GPU_COUNTS: [i64; 4] = [1, 2, 4, 8];

pub const BATCH_SIZES: [i64; 4] = [16, 32, 64, 128];

pub const EPOCH_COUNTS: [i64; 5] = [3, 5, 8, 12, 20];

pub const BRANCHES: [&str; 4] = ["main", "train/sweep", "hotfix/metrics", "exp/augments"];

pub const CLUSTERS: [&str; 4] = ["orion", "atlas", "zephyr", "nebula"];

pub const REGIONS: [&str; 3] = ["us-east", "us-west", "eu-central"];

pub const LOG_SOURCES: [&str; 5] = ["trainer", "dataloader", "eval", "checkpoint", "system"];

pub const TRACE_TAGS: [&str; 5] = ["shadow", "edge-case", "baseline", "canary", "perf"];

pub const DEPLOYMENT_INCIDENT_TITLES: [&str; 4] = [
    "p95 latency regression",
    "error rate spike",
    "canary divergence detected",
    "CPU saturation on inference workers",
];

const DEBUG_TEMPLATES: [&str; 4] = [
    "prefetch queue depth=#{n} batch=#{b}",
    "tokenizer cache hit rate=#{n}%",
    "scheduler tick: pending=#{n} running=#{b}",
    "cuda kernel launch latency=#{n}us",
];

const INFO_TEMPLATES: [&str; 5] = [
    "step=#{step} loss=#{loss} acc=#{acc} lr=#{lr}",
    "checkpoint saved: ckpt_#{n}.pt (#{mb}MB)",
    "eval: split=dev p95=#{n}ms acc=#{acc}",
    "data: shard=#{n}/#{b} throughput=#{tp}/s",
    "git: commit=#{commit}",
];

const WARN_TEMPLATES: [&str; 4] = [
    "dataloader stall detected: wait=#{n}ms",
    "gpu throttling: temp=#{n}C",
    "retrying request to feature store (attempt #{b})",
    "skipping batch: NaNs detected in input tensor",
];

const ERROR_TEMPLATES: [&str; 4] = [
    "CUDA out of memory: tried to allocate #{mb}MB",
    "checkpoint write failed: EIO (disk pressure)",
    "evaluation failed: invalid label index #{n}",
    "fatal: unrecoverable gradient explosion at step #{step}",
];

/// Synthetic 12-character commit hash. Twelve draws.
pub fn format_commit(rng: &mut SeededRng) -> String {
    const CHARS: &[u8; 16] = b"abcdef0123456789";
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    (0..12)
        .map(|_| CHARS[(rng.next_f64() * 16.0).floor() as usize] as char)
        .collect()
}

/// `{adjective}-{noun}-{two digits}` run name. Three draws.
pub fn format_run_name(rng: &mut SeededRng) -> Result<String, EmptyInputError> {
    const ADJECTIVES: [&str; 12] = [
        "amber", "brisk", "carbon", "delta", "ember", "flux", "glacier", "helium", "ivory",
        "jolt", "kinetic", "lumen",
    ];
    const NOUNS: [&str; 7] = [
        "otter", "falcon", "orchid", "quartz", "satellite", "kepler", "gizmo",
    ];
    let adjective = rng.pick(&ADJECTIVES)?;
    let noun = rng.pick(&NOUNS)?;
    let number = rng.random_int(10, 99);
    Ok(format!("{adjective}-{noun}-{number}"))
}

/// Pick a log level; the distribution shifts toward WARN/ERROR inside the
/// incident window. One draw.
pub fn pick_log_level(rng: &mut SeededRng, in_incident_window: bool) -> LogLevel {
    let x = rng.next_f64();
    if in_incident_window {
        if x < 0.06 {
            return LogLevel::Error;
        }
        if x < 0.22 {
            return LogLevel::Warn;
        }
        if x < 0.78 {
            return LogLevel::Info;
        }
        return LogLevel::Debug;
    }
    if x < 0.01 {
        return LogLevel::Error;
    }
    if x < 0.07 {
        return LogLevel::Warn;
    }
    if x < 0.7 {
        return LogLevel::Info;
    }
    LogLevel::Debug
}

/// Build a log message body from the per-level template pool.
///
/// Consumes a fixed eight draws (template pick plus all seven numeric
/// fillers) regardless of which placeholders the chosen template uses.
pub fn format_log_message(
    rng: &mut SeededRng,
    level: LogLevel,
    source: &str,
    commit_hash: &str,
    step: usize,
) -> Result<String, EmptyInputError> {
    let base = match level {
        LogLevel::Debug => rng.pick(&DEBUG_TEMPLATES)?,
        LogLevel::Info => rng.pick(&INFO_TEMPLATES)?,
        LogLevel::Warn => rng.pick(&WARN_TEMPLATES)?,
        LogLevel::Error => rng.pick(&ERROR_TEMPLATES)?,
    };

    let n = rng.random_int(1, 99).to_string();
    let b = rng.random_int(2, 24).to_string();
    let mb = rng.random_int(12, 980).to_string();
    let tp = rng.random_int(80, 1200).to_string();
    let acc = format!("{:.3}", rng.random_float(0.55, 0.92));
    let loss = format!("{:.4}", rng.random_float(0.12, 2.9));
    let lr = format!("{:.6}", rng.random_float(0.000_01, 0.0015));
    let step_id = format!("{step:06}");
    let commit = commit_hash.chars().take(12).collect::<String>();

    let message = base
        .replace("#{n}", &n)
        .replace("#{b}", &b)
        .replace("#{mb}", &mb)
        .replace("#{tp}", &tp)
        .replace("#{acc}", &acc)
        .replace("#{loss}", &loss)
        .replace("#{lr}", &lr)
        .replace("#{step}", &step_id)
        .replace("#{commit}", &commit);

    Ok(format!("[{source}] {message}"))
}

static DIGIT_RUNS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"[0-9]+").unwrap()
});
static HEX_LITERALS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\b0x[0-9a-fA-F]+\b").unwrap()
});
static HASH_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\b[a-f0-9]{7,40}\b").unwrap()
});

/// Stand-in for hex literals while the digit rule runs; no digits or hex
/// word characters, so the other rules cannot touch it.
const HEX_SENTINEL: &str = "__hexlit__";

/// Normalize a log message for grouping: hex literals become `0x#`, bare
/// hash-like words `<hash>`, digit runs `#`. Hex literals are shielded
/// behind a sentinel first, otherwise the digit rule would eat their `0x`
/// prefix. Substitution order is part of the contract.
#[must_use]
pub fn fingerprint(message: &str) -> String {
    let step1 = HEX_LITERALS.replace_all(message, HEX_SENTINEL);
    let step2 = HASH_WORDS.replace_all(&step1, "<hash>");
    let step3 = DIGIT_RUNS.replace_all(&step2, "#");
    step3.replace(HEX_SENTINEL, "0x#").trim().to_owned()
}
