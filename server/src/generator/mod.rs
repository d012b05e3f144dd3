//! Deterministic dataset synthesis.
//!
//! [`Dataset::generate`] builds the entire world from a seed string and a
//! reference instant: experiments, runs (with full logs, metric series, and
//! timelines), config versions, authoring templates, registry models and
//! versions, deployments, and traces. The same seed and instant always
//! produce the same dataset; every draw comes from one [`SeededRng`] stream
//! shared across the whole build, so the draw order below is part of the
//! determinism contract.

pub mod config;
pub mod logs;
pub mod metrics;
pub mod text;
pub mod timeline;
pub mod traces;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};

use crate::rng::{EmptyInputError, SeededRng};
use crate::time::{add_hours, add_minutes};
use crate::types::{
    Artifact, ArtifactKind, AuthoringTemplate, ConfigLanguage, ConfigVersion, Deployment,
    DeploymentStage, DeploymentStatus, EvalSummary, Experiment, LogLine, MetricPoint, Model,
    ModelVersion, ModelVersionStage, RolloutStep, RolloutStepStatus, Run, RunStatus,
    TimelineEvent, Trace,
};
use crate::types::run::{ClusterMeta, CodeMeta, ComputeMeta, DatasetMeta, RunMeta};

use config::{make_config, template_specs};
use logs::gen_logs;
use metrics::{METRIC_NAMES, metric_series};
use text::{BRANCHES, CLUSTERS, EXPERIMENT_NAMES, EXPERIMENT_TAGS, OWNERS, REGIONS, TRACE_TAGS,
    format_commit};
use timeline::gen_timeline;
use traces::gen_trace_steps;

/// Experiment that collects runs started from authoring configs. Created
/// unconditionally with a fixed id so those runs always have a home.
pub const QUICK_EXPERIMENT_ID: &str = "exp_quick";

/// Errors raised while synthesizing a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// A pick was attempted on an empty pool.
    EmptyInput(EmptyInputError),
    /// A config could not be encoded to YAML or JSON text.
    ConfigEncode(String),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput(inner) => inner.fmt(f),
            Self::ConfigEncode(message) => write!(f, "failed to encode config: {message}"),
        }
    }
}

impl std::error::Error for GenerateError {}

impl From<EmptyInputError> for GenerateError {
    fn from(inner: EmptyInputError) -> Self {
        Self::EmptyInput(inner)
    }
}

/// Scale a draw to `[0, scale)` and truncate to an integer, for hex tokens
/// in synthetic ids.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn draw_u64(rng: &mut SeededRng, scale: f64) -> u64 {
    (rng.next_f64() * scale).floor() as u64
}

/// Produces ids like `run_1a2b3c4d0007`: a drawn 32-bit hex body followed by
/// a counter shared across all prefixes, so ids are unique even when two
/// draws collide.
#[derive(Debug, Clone, Default)]
pub struct IdFactory {
    counter: u64,
}

impl IdFactory {
    #[must_use]
    pub const fn new() -> Self {
        Self { counter: 0 }
    }

    pub fn make(&mut self, rng: &mut SeededRng, prefix: &str) -> String {
        self.counter += 1;
        let body = draw_u64(rng, 4_294_967_295.0);
        format!("{prefix}_{body:08x}{:04x}", self.counter)
    }
}

/// Everything generated for one run beyond the [`Run`] record itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RunData {
    pub logs: Vec<LogLine>,
    pub metrics: BTreeMap<String, Vec<MetricPoint>>,
    pub timeline: Vec<TimelineEvent>,
}

/// An authoring template together with its version history. Each version is
/// also registered in the dataset's `config_versions` map. Serializes as the
/// template fields plus a `versions` array.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TemplateRecord {
    #[serde(flatten)]
    pub template: AuthoringTemplate,
    pub versions: Vec<ConfigVersion>,
}

/// The complete synthetic world.
///
/// Listing order for runs matters (registry versions pick best runs by
/// position), so `run_order` records insertion order alongside the id-keyed
/// map.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub experiments: HashMap<String, Experiment>,
    pub runs: HashMap<String, Run>,
    pub run_order: Vec<String>,
    pub runs_by_experiment: HashMap<String, Vec<String>>,
    pub run_data: HashMap<String, RunData>,
    pub config_versions: HashMap<String, ConfigVersion>,
    pub templates: Vec<TemplateRecord>,
    pub models: Vec<Model>,
    pub model_versions: HashMap<String, Vec<ModelVersion>>,
    pub deployments: HashMap<String, Deployment>,
    pub traces: HashMap<String, Trace>,
    pub ids: IdFactory,
    pub rng: SeededRng,
}

impl Dataset {
    /// Build the full dataset for `seed` as of `now`.
    #[allow(clippy::too_many_lines)]
    pub fn generate(seed: &str, now: DateTime<Utc>) -> Result<Self, GenerateError> {
        let mut rng = SeededRng::new(seed);
        let mut ids = IdFactory::new();

        let mut experiments = HashMap::new();
        let mut runs = HashMap::new();
        let mut run_order = Vec::new();
        let mut runs_by_experiment: HashMap<String, Vec<String>> = HashMap::new();
        let mut run_data = HashMap::new();
        let mut config_versions = HashMap::new();
        let mut templates = Vec::new();
        let mut models = Vec::new();
        let mut model_versions: HashMap<String, Vec<ModelVersion>> = HashMap::new();
        let mut deployments = HashMap::new();
        let mut traces = HashMap::new();

        experiments.insert(
            QUICK_EXPERIMENT_ID.to_owned(),
            Experiment {
                id: QUICK_EXPERIMENT_ID.to_owned(),
                name: "Quick Runs".to_owned(),
                owner: "you".to_owned(),
                created_at: add_hours(now, -6.0),
                tags: vec!["ad-hoc".to_owned(), "authoring".to_owned()],
                description: "Runs created from authoring configs.".to_owned(),
            },
        );
        runs_by_experiment.insert(QUICK_EXPERIMENT_ID.to_owned(), Vec::new());

        for name in EXPERIMENT_NAMES {
            let experiment_id = ids.make(&mut rng, "exp");
            let created_at = hours_back(&mut rng, now, 12, 240);
            let owner = (*rng.pick(&OWNERS)?).to_owned();
            let tags = unique_sample(&mut rng, &EXPERIMENT_TAGS, 2, 4);

            experiments.insert(
                experiment_id.clone(),
                Experiment {
                    id: experiment_id.clone(),
                    name: name.to_owned(),
                    owner: owner.clone(),
                    created_at,
                    tags,
                    description: "Synthetic experiment covering runs, metric and log streaming, \
                                  and the debugging timeline."
                        .to_owned(),
                },
            );
            runs_by_experiment.insert(experiment_id.clone(), Vec::new());

            let run_count = rng.random_int(3, 6);
            for _ in 0..run_count {
                let run_id = ids.make(&mut rng, "run");
                let status = pick_run_status(&mut rng);
                let duration_minutes = rng.random_int(70, 140);

                let elapsed_minutes = if status == RunStatus::Running {
                    rng.random_int(16, 86)
                } else {
                    duration_minutes + rng.random_int(-4, 9)
                };
                let start_date = if status == RunStatus::Running {
                    add_minutes(now, -to_f64(elapsed_minutes))
                } else {
                    let day = hours_back(&mut rng, now, 2, 48);
                    add_minutes(day, -to_f64(rng.random_int(0, 90)))
                };

                let incident_at_minute = rng.random_int(
                    10,
                    (elapsed_minutes - 6).min(duration_minutes - 15).max(14),
                );
                let commit_hash = format_commit(&mut rng);

                let mut cfg = make_config(&mut rng)?;
                cfg.owner = owner.clone();
                let language = if rng.chance(0.35) {
                    ConfigLanguage::Yaml
                } else {
                    ConfigLanguage::Json
                };
                let content = cfg.to_text(language).map_err(GenerateError::ConfigEncode)?;
                let config_version_id = ids.make(&mut rng, "cfg");
                config_versions.insert(
                    config_version_id.clone(),
                    ConfigVersion {
                        id: config_version_id.clone(),
                        created_at: start_date,
                        title: format!("run config ({})", language.as_str().to_uppercase()),
                        language,
                        content,
                        schema_version: 1,
                        parent_id: None,
                    },
                );

                let gen_minutes = if status == RunStatus::Running {
                    elapsed_minutes
                } else {
                    duration_minutes
                };
                let data =
                    synth_run_data(&mut rng, start_date, gen_minutes, incident_at_minute, &commit_hash)?;

                let ended_at = if status == RunStatus::Running {
                    None
                } else {
                    Some(add_minutes(
                        start_date,
                        to_f64(duration_minutes + rng.random_int(-4, 9)),
                    ))
                };

                let run = Run {
                    id: run_id.clone(),
                    experiment_id: experiment_id.clone(),
                    status,
                    started_at: start_date,
                    ended_at,
                    config_version_id,
                    metrics_summary: metrics_summary(&data.metrics),
                    artifacts: gen_artifacts(&mut rng, &run_id),
                    meta: RunMeta {
                        dataset: DatasetMeta {
                            name: cfg.training.dataset.name.clone(),
                            version: cfg.training.dataset.version.clone(),
                        },
                        compute: ComputeMeta {
                            gpu_type: cfg.training.compute.gpu_type.clone(),
                            gpus: cfg.training.compute.gpus,
                            spot: rng.chance(0.35),
                        },
                        code: CodeMeta {
                            commit_hash: commit_hash.clone(),
                            branch: (*rng.pick(&BRANCHES)?).to_owned(),
                        },
                        cluster: ClusterMeta {
                            name: (*rng.pick(&CLUSTERS)?).to_owned(),
                            region: (*rng.pick(&REGIONS)?).to_owned(),
                        },
                    },
                };

                runs.insert(run_id.clone(), run);
                run_order.push(run_id.clone());
                if let Some(list) = runs_by_experiment.get_mut(&experiment_id) {
                    list.push(run_id.clone());
                }
                run_data.insert(run_id, data);
            }
        }

        for spec in template_specs() {
            let template_id = ids.make(&mut rng, "tpl");
            let mut base = make_config(&mut rng)?;
            base.name = format!("template/{}", spec.title.to_lowercase().replace(' ', "-"));

            let mut versions: Vec<ConfigVersion> = Vec::new();
            let mut parent_id: Option<String> = None;
            for (i, variant) in spec.variants.iter().enumerate() {
                let cfg = variant.apply(&base);
                let content = cfg
                    .to_text(spec.language)
                    .map_err(GenerateError::ConfigEncode)?;
                let id = ids.make(&mut rng, "cfg");
                let created_at = hours_back(&mut rng, now, 2, 72);
                let version = ConfigVersion {
                    id: id.clone(),
                    created_at,
                    title: format!("v{}", i + 1),
                    language: spec.language,
                    content,
                    schema_version: 1,
                    parent_id: parent_id.clone(),
                };
                config_versions.insert(id.clone(), version.clone());
                versions.push(version);
                parent_id = Some(id);
            }

            let Some(latest) = versions.last() else {
                continue;
            };
            templates.push(TemplateRecord {
                template: AuthoringTemplate {
                    id: template_id,
                    title: spec.title.to_owned(),
                    description: spec.description.to_owned(),
                    language: spec.language,
                    latest_config_version_id: latest.id.clone(),
                },
                versions,
            });
        }

        let model_specs: [(&str, &str); 4] = [
            (
                "SupportIntent",
                "Multi-class intent model powering support triage and self-serve answers.",
            ),
            (
                "SearchRanker",
                "Learning-to-rank model tuned for latency-aware relevance.",
            ),
            (
                "FraudScore",
                "Graph-augmented risk model for real-time fraud scoring.",
            ),
            (
                "ImageModeration",
                "Vision classifier for policy compliance and safety.",
            ),
        ];

        for (name, description) in model_specs {
            let model_id = ids.make(&mut rng, "model");
            let mut versions = Vec::new();
            for i in 0..3 {
                let best_run_id = rng.pick(&run_order)?.clone();
                versions.push(ModelVersion {
                    id: ids.make(&mut rng, "mv"),
                    model_id: model_id.clone(),
                    version: format!("v{}.{}", i + 1, rng.random_int(0, 9)),
                    created_at: hours_back(&mut rng, now, 12, 240),
                    best_run_id,
                    eval_summary: EvalSummary {
                        accuracy: round_to(rng.random_float(0.7, 0.93), 3),
                        latency_p95_ms: round_to(rng.random_float(18.0, 120.0), 1),
                        robustness: round_to(rng.random_float(0.55, 0.92), 3),
                    },
                    stage: match i {
                        2 => ModelVersionStage::Production,
                        1 => ModelVersionStage::Staging,
                        _ => ModelVersionStage::Draft,
                    },
                });
            }
            model_versions.insert(model_id.clone(), versions);
            models.push(Model {
                id: model_id,
                name: name.to_owned(),
                description: description.to_owned(),
            });
        }

        // Deployments only exist for versions past draft.
        for model in &models {
            let Some(versions) = model_versions.get(&model.id) else {
                continue;
            };
            for version in versions {
                if version.stage == ModelVersionStage::Draft {
                    continue;
                }
                let dep_id = ids.make(&mut rng, "dep");
                let stage = if version.stage == ModelVersionStage::Production {
                    DeploymentStage::Prod
                } else {
                    *rng.pick(&[DeploymentStage::Canary, DeploymentStage::Ramp])?
                };
                let started_at = hours_back(&mut rng, now, 1, 72);
                let rollout_steps = vec![
                    RolloutStep {
                        id: ids.make(&mut rng, "step"),
                        title: "Canary (1%)".to_owned(),
                        status: if stage == DeploymentStage::Canary {
                            RolloutStepStatus::Active
                        } else {
                            RolloutStepStatus::Done
                        },
                    },
                    RolloutStep {
                        id: ids.make(&mut rng, "step"),
                        title: "Ramp (10% → 50%)".to_owned(),
                        status: match stage {
                            DeploymentStage::Ramp => RolloutStepStatus::Active,
                            DeploymentStage::Prod => RolloutStepStatus::Done,
                            DeploymentStage::Canary => RolloutStepStatus::Pending,
                        },
                    },
                    RolloutStep {
                        id: ids.make(&mut rng, "step"),
                        title: "Promote (100%)".to_owned(),
                        status: if stage == DeploymentStage::Prod {
                            RolloutStepStatus::Active
                        } else {
                            RolloutStepStatus::Pending
                        },
                    },
                ];
                let status = *rng.pick(&[
                    DeploymentStatus::Running,
                    DeploymentStatus::Running,
                    DeploymentStatus::Paused,
                    DeploymentStatus::Succeeded,
                ])?;
                let ended_at = if rng.chance(0.25) {
                    Some(add_hours(started_at, to_f64(rng.random_int(1, 6))))
                } else {
                    None
                };
                deployments.insert(
                    dep_id.clone(),
                    Deployment {
                        id: dep_id,
                        model_version_id: version.id.clone(),
                        stage,
                        status,
                        started_at,
                        ended_at,
                        rollout_steps,
                        incidents: Vec::new(),
                    },
                );
            }
        }

        let model_version_ids: Vec<String> = models
            .iter()
            .filter_map(|m| model_versions.get(&m.id))
            .flatten()
            .map(|v| v.id.clone())
            .collect();
        for _ in 0..18 {
            let model_version_id = rng.pick(&model_version_ids)?.clone();
            let trace_id = ids.make(&mut rng, "trace");
            let created_at = hours_back(&mut rng, now, 1, 48);
            let request_id = format!("req_{:x}", draw_u64(&mut rng, 1e12));

            let error_step_index = if rng.chance(0.18) {
                Some(rng.random_int(1, 3))
            } else {
                None
            };
            let steps = gen_trace_steps(&mut rng, created_at, error_step_index);
            let tags = unique_sample(&mut rng, &TRACE_TAGS, 1, 3);

            traces.insert(
                trace_id.clone(),
                Trace {
                    id: trace_id,
                    created_at,
                    request_id,
                    model_version_id,
                    steps,
                    tags,
                },
            );
        }

        Ok(Self {
            experiments,
            runs,
            run_order,
            runs_by_experiment,
            run_data,
            config_versions,
            templates,
            models,
            model_versions,
            deployments,
            traces,
            ids,
            rng,
        })
    }
}

/// Generate the logs, metric series, and timeline for one run. Also used
/// when a run is created live from an authoring config.
pub fn synth_run_data(
    rng: &mut SeededRng,
    start: DateTime<Utc>,
    duration_minutes: i64,
    incident_at_minute: i64,
    commit_hash: &str,
) -> Result<RunData, EmptyInputError> {
    let mut metrics = BTreeMap::new();
    for name in METRIC_NAMES {
        metrics.insert(
            name.to_owned(),
            metric_series(rng, name, start, duration_minutes, 15, incident_at_minute, true),
        );
    }
    let logs = gen_logs(rng, start, duration_minutes, incident_at_minute, commit_hash)?;
    let timeline = gen_timeline(rng, start, duration_minutes, incident_at_minute, commit_hash)?;
    Ok(RunData {
        logs,
        metrics,
        timeline,
    })
}

/// Last observed value per series.
#[must_use]
pub fn metrics_summary(metrics: &BTreeMap<String, Vec<MetricPoint>>) -> BTreeMap<String, f64> {
    metrics
        .iter()
        .filter_map(|(name, points)| points.last().map(|p| (name.clone(), p.value)))
        .collect()
}

/// Checkpoints plus a fixed eval report and metrics plot.
pub fn gen_artifacts(rng: &mut SeededRng, run_id: &str) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    let checkpoints = rng.random_int(2, 5);
    for i in 0..checkpoints {
        artifacts.push(Artifact {
            id: format!("{run_id}_a{i}"),
            name: format!("checkpoint_{:02}.pt", i + 1),
            kind: ArtifactKind::Checkpoint,
            size_bytes: rng.random_int(80_000_000, 460_000_000),
        });
    }
    artifacts.push(Artifact {
        id: format!("{run_id}_report"),
        name: "eval_report.json".to_owned(),
        kind: ArtifactKind::Report,
        size_bytes: rng.random_int(14_000, 220_000),
    });
    artifacts.push(Artifact {
        id: format!("{run_id}_plot"),
        name: "metrics.png".to_owned(),
        kind: ArtifactKind::Plot,
        size_bytes: rng.random_int(48_000, 380_000),
    });
    artifacts
}

fn pick_run_status(rng: &mut SeededRng) -> RunStatus {
    let x = rng.next_f64();
    if x < 0.12 {
        RunStatus::Running
    } else if x < 0.2 {
        RunStatus::Failed
    } else if x < 0.26 {
        RunStatus::Canceled
    } else {
        RunStatus::Succeeded
    }
}

/// Draw up to `max` distinct entries from `items`, in draw order.
fn unique_sample(rng: &mut SeededRng, items: &[&str], min: i64, max: i64) -> Vec<String> {
    let count = usize::try_from(rng.random_int(min, max))
        .unwrap_or(0)
        .min(items.len());
    let mut pool: Vec<&str> = items.to_vec();
    let mut picked = Vec::with_capacity(count);
    while picked.len() < count && !pool.is_empty() {
        let upper = i64::try_from(pool.len() - 1).unwrap_or(0);
        let idx = usize::try_from(rng.random_int(0, upper)).unwrap_or(0);
        picked.push(pool.remove(idx).to_owned());
    }
    picked
}

fn hours_back(
    rng: &mut SeededRng,
    now: DateTime<Utc>,
    min_hours: i64,
    max_hours: i64,
) -> DateTime<Utc> {
    add_hours(now, -to_f64(rng.random_int(min_hours, max_hours)))
}

#[allow(clippy::cast_precision_loss)]
const fn to_f64(value: i64) -> f64 {
    value as f64
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
