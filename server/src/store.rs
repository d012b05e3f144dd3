//! Read and mutate queries over a generated [`Dataset`].
//!
//! The store owns the dataset, the shared rng, and a [`TimeSource`] so that
//! every query is reproducible under test. Listings sort on timestamps with
//! the id as tie-breaker: map iteration order must never leak into results.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::generator::text::{CLUSTERS, DEPLOYMENT_INCIDENT_TITLES, format_commit};
use crate::generator::{
    Dataset, GenerateError, QUICK_EXPERIMENT_ID, TemplateRecord, gen_artifacts, metrics,
    metrics_summary, synth_run_data,
};
use crate::rng::EmptyInputError;
use crate::time::TimeSource;
use crate::types::run::{ClusterMeta, CodeMeta, ComputeMeta, DatasetMeta, RunMeta};
use crate::types::{
    AuthoringConfig, AuthoringTemplate, ConfigLanguage, ConfigVersion, Deployment,
    DeploymentStage, DeploymentStatus, Experiment, Incident, IncidentSeverity, LogLine,
    MetricPoint, Model, ModelVersion, RolloutStepStatus, Run, RunStatus, RunWithTimeline,
    Severity, Trace, TimelineEventType,
};

/// Errors returned by store queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced entity does not exist.
    NotFound { kind: &'static str, id: String },
    /// A draw from an empty pool was attempted while synthesizing data.
    Draw(EmptyInputError),
}

impl StoreError {
    fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_owned(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Draw(inner) => inner.fmt(f),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<EmptyInputError> for StoreError {
    fn from(inner: EmptyInputError) -> Self {
        Self::Draw(inner)
    }
}

/// One page of a cursor-paginated listing.
///
/// Pagination walks backwards: the first page (no cursor) holds the newest
/// `limit` items and `next_cursor` points at the page of older items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// An alert surfaced on the dashboard, denormalized with its run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAlert {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub title: String,
    pub severity: Severity,
    pub run_id: String,
    pub experiment_id: String,
}

/// Fleet-level sparkline series. Field names match the metric names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sparklines {
    pub gpu_util: Vec<MetricPoint>,
    pub throughput: Vec<MetricPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub active_runs: Vec<Run>,
    pub recent_deploys: Vec<Deployment>,
    pub alerts: Vec<DashboardAlert>,
    pub sparklines: Sparklines,
}

/// Result of creating a run from an authoring config.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRun {
    pub run: Run,
    pub experiment: Experiment,
    pub config_version: ConfigVersion,
}

/// In-memory store over one generated dataset.
pub struct QueryStore {
    seed: String,
    data: Dataset,
    time: Arc<dyn TimeSource>,
}

impl QueryStore {
    /// Generate the dataset for `seed` as observed through `time`.
    pub fn new(seed: &str, time: Arc<dyn TimeSource>) -> Result<Self, GenerateError> {
        let data = Dataset::generate(seed, time.now())?;
        Ok(Self {
            seed: seed.to_owned(),
            data,
            time,
        })
    }

    #[must_use]
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// All experiments, newest first.
    #[must_use]
    pub fn list_experiments(&self) -> Vec<Experiment> {
        let mut list: Vec<Experiment> = self.data.experiments.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn get_experiment(&self, id: &str) -> Result<Experiment, StoreError> {
        self.data
            .experiments
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Experiment", id))
    }

    /// Runs of one experiment, newest started first.
    pub fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>, StoreError> {
        let ids = self
            .data
            .runs_by_experiment
            .get(experiment_id)
            .ok_or_else(|| StoreError::not_found("Experiment", experiment_id))?;
        let mut list: Vec<Run> = ids
            .iter()
            .filter_map(|id| self.data.runs.get(id))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    /// A run together with its timeline.
    pub fn get_run(&self, id: &str) -> Result<RunWithTimeline, StoreError> {
        let run = self
            .data
            .runs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Run", id))?;
        let timeline = self
            .data
            .run_data
            .get(id)
            .map(|d| d.timeline.clone())
            .unwrap_or_default();
        Ok(RunWithTimeline { run, timeline })
    }

    /// A page of a run's log, walking backwards from the newest line.
    ///
    /// `cursor` is the index one past the end of the requested page; absent
    /// or unparsable cursors mean "the newest page". `limit` is clamped to
    /// `1..=1000`.
    pub fn run_logs(
        &self,
        run_id: &str,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Page<LogLine>, StoreError> {
        if !self.data.runs.contains_key(run_id) {
            return Err(StoreError::not_found("Run", run_id));
        }
        let items: &[LogLine] = self
            .data
            .run_data
            .get(run_id)
            .map_or(&[], |d| d.logs.as_slice());

        let safe_limit = usize::try_from(limit.clamp(1, 1000)).unwrap_or(1);
        let before_index = cursor
            .and_then(|c| c.parse::<usize>().ok())
            .map_or(items.len(), |index| index.min(items.len()));
        let start_index = before_index.saturating_sub(safe_limit);

        Ok(Page {
            items: items[start_index..before_index].to_vec(),
            next_cursor: (start_index > 0).then(|| start_index.to_string()),
        })
    }

    /// One metric series of a run, optionally restricted to `[from, to]`.
    pub fn run_metrics(
        &self,
        run_id: &str,
        name: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<MetricPoint>, StoreError> {
        if !self.data.runs.contains_key(run_id) {
            return Err(StoreError::not_found("Run", run_id));
        }
        let series: &[MetricPoint] = self
            .data
            .run_data
            .get(run_id)
            .and_then(|d| d.metrics.get(name))
            .map_or(&[], Vec::as_slice);
        Ok(series
            .iter()
            .filter(|p| from.is_none_or(|f| p.ts >= f) && to.is_none_or(|t| p.ts <= t))
            .cloned()
            .collect())
    }

    /// All registered models, sorted by name.
    #[must_use]
    pub fn list_models(&self) -> Vec<Model> {
        let mut list = self.data.models.clone();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        list
    }

    /// Versions of one model, newest first.
    pub fn list_model_versions(&self, model_id: &str) -> Result<Vec<ModelVersion>, StoreError> {
        let mut list = self
            .data
            .model_versions
            .get(model_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Model", model_id))?;
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    /// All deployments, newest started first.
    #[must_use]
    pub fn list_deployments(&self) -> Vec<Deployment> {
        let mut list: Vec<Deployment> = self.data.deployments.values().cloned().collect();
        list.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn get_deployment(&self, id: &str) -> Result<Deployment, StoreError> {
        self.data
            .deployments
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Deployment", id))
    }

    /// Attach a fresh incident to a deployment and pause it.
    pub fn simulate_incident(&mut self, deployment_id: &str) -> Result<Deployment, StoreError> {
        if !self.data.deployments.contains_key(deployment_id) {
            return Err(StoreError::not_found("Deployment", deployment_id));
        }
        let now = self.time.now();
        let data = &mut self.data;
        let incident = Incident {
            id: data.ids.make(&mut data.rng, "inc"),
            created_at: now,
            title: (*data.rng.pick(&DEPLOYMENT_INCIDENT_TITLES)?).to_owned(),
            severity: if data.rng.chance(0.55) {
                IncidentSeverity::Critical
            } else {
                IncidentSeverity::Warning
            },
        };
        let deployment = data
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| StoreError::not_found("Deployment", deployment_id))?;
        deployment.incidents.insert(0, incident);
        deployment.status = DeploymentStatus::Paused;
        Ok(deployment.clone())
    }

    /// Move a deployment to its next stage, or complete it from `prod`.
    ///
    /// A rolled-back deployment is terminal: advancing it is a no-op.
    pub fn advance_deployment(&mut self, deployment_id: &str) -> Result<Deployment, StoreError> {
        let now = self.time.now();
        let deployment = self
            .data
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| StoreError::not_found("Deployment", deployment_id))?;
        if deployment.status == DeploymentStatus::RolledBack {
            return Ok(deployment.clone());
        }

        match deployment.stage {
            DeploymentStage::Canary => {
                deployment.stage = DeploymentStage::Ramp;
                deployment.status = DeploymentStatus::Running;
                set_step_statuses(
                    deployment,
                    [
                        RolloutStepStatus::Done,
                        RolloutStepStatus::Active,
                        RolloutStepStatus::Pending,
                    ],
                );
            }
            DeploymentStage::Ramp => {
                deployment.stage = DeploymentStage::Prod;
                deployment.status = DeploymentStatus::Running;
                set_step_statuses(
                    deployment,
                    [
                        RolloutStepStatus::Done,
                        RolloutStepStatus::Done,
                        RolloutStepStatus::Active,
                    ],
                );
            }
            DeploymentStage::Prod => {
                deployment.status = DeploymentStatus::Succeeded;
                deployment.ended_at = Some(now);
                for step in &mut deployment.rollout_steps {
                    step.status = RolloutStepStatus::Done;
                }
            }
        }
        Ok(deployment.clone())
    }

    /// Abort a deployment, marking the promote step failed.
    pub fn rollback_deployment(&mut self, deployment_id: &str) -> Result<Deployment, StoreError> {
        let now = self.time.now();
        let deployment = self
            .data
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| StoreError::not_found("Deployment", deployment_id))?;
        deployment.status = DeploymentStatus::RolledBack;
        deployment.ended_at = Some(now);

        let stage = deployment.stage;
        for (idx, step) in deployment.rollout_steps.iter_mut().enumerate() {
            step.status = match idx {
                0 => RolloutStepStatus::Done,
                // The ramp step only completed if the rollout got past canary.
                1 if stage != DeploymentStage::Canary => RolloutStepStatus::Done,
                2 => RolloutStepStatus::Failed,
                _ => step.status,
            };
        }
        Ok(deployment.clone())
    }

    pub fn get_trace(&self, id: &str) -> Result<Trace, StoreError> {
        self.data
            .traces
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Trace", id))
    }

    /// Authoring templates without their version history, sorted by title.
    #[must_use]
    pub fn list_templates(&self) -> Vec<AuthoringTemplate> {
        let mut list: Vec<AuthoringTemplate> = self
            .data
            .templates
            .iter()
            .map(|record| record.template.clone())
            .collect();
        list.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn get_template(&self, id: &str) -> Result<TemplateRecord, StoreError> {
        self.data
            .templates
            .iter()
            .find(|record| record.template.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Template", id))
    }

    pub fn get_config_version(&self, id: &str) -> Result<ConfigVersion, StoreError> {
        self.data
            .config_versions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Config version", id))
    }

    /// Start a synthetic run from a validated authoring config.
    ///
    /// The run lands at the front of the target experiment's listing (the
    /// quick-runs experiment unless one is named) with a freshly synthesized
    /// log, metric, and timeline history.
    pub fn create_run_from_config(
        &mut self,
        experiment_id: Option<String>,
        language: ConfigLanguage,
        content: String,
        parsed: &AuthoringConfig,
    ) -> Result<CreatedRun, StoreError> {
        let now = self.time.now();
        let experiment_id = experiment_id.unwrap_or_else(|| QUICK_EXPERIMENT_ID.to_owned());

        let experiment = if let Some(existing) = self.data.experiments.get(&experiment_id) {
            existing.clone()
        } else {
            let experiment = Experiment {
                id: experiment_id.clone(),
                name: "Quick Runs".to_owned(),
                owner: parsed.owner.clone(),
                created_at: now,
                tags: vec!["ad-hoc".to_owned(), "authoring".to_owned()],
                description: "Runs created from authoring configs.".to_owned(),
            };
            self.data
                .experiments
                .insert(experiment_id.clone(), experiment.clone());
            self.data
                .runs_by_experiment
                .insert(experiment_id.clone(), Vec::new());
            experiment
        };

        let data = &mut self.data;
        let run_id = data.ids.make(&mut data.rng, "run");
        let duration_minutes = data.rng.random_int(70, 140);
        let incident_at_minute = data.rng.random_int(18, (duration_minutes - 15).max(22));
        let commit_hash = format_commit(&mut data.rng);

        let config_version_id = data.ids.make(&mut data.rng, "cfg");
        let config_version = ConfigVersion {
            id: config_version_id.clone(),
            created_at: now,
            title: "authoring draft".to_owned(),
            language,
            content,
            schema_version: 1,
            parent_id: None,
        };
        data.config_versions
            .insert(config_version_id.clone(), config_version.clone());

        let run_series =
            synth_run_data(&mut data.rng, now, duration_minutes, incident_at_minute, &commit_hash)?;

        let run = Run {
            id: run_id.clone(),
            experiment_id: experiment_id.clone(),
            status: RunStatus::Running,
            started_at: now,
            ended_at: None,
            config_version_id,
            metrics_summary: metrics_summary(&run_series.metrics),
            artifacts: gen_artifacts(&mut data.rng, &run_id),
            meta: RunMeta {
                dataset: DatasetMeta {
                    name: parsed.training.dataset.name.clone(),
                    version: parsed.training.dataset.version.clone(),
                },
                compute: ComputeMeta {
                    gpu_type: parsed.training.compute.gpu_type.clone(),
                    gpus: parsed.training.compute.gpus,
                    spot: data.rng.chance(0.35),
                },
                code: CodeMeta {
                    commit_hash,
                    branch: "authoring/draft".to_owned(),
                },
                cluster: ClusterMeta {
                    name: (*data.rng.pick(&CLUSTERS)?).to_owned(),
                    region: "us-east".to_owned(),
                },
            },
        };

        data.runs.insert(run_id.clone(), run.clone());
        data.run_order.push(run_id.clone());
        data.runs_by_experiment
            .entry(experiment_id)
            .or_default()
            .insert(0, run_id.clone());
        data.run_data.insert(run_id, run_series);

        Ok(CreatedRun {
            run,
            experiment,
            config_version,
        })
    }

    /// Fleet overview: newest running runs, recent deployments, recent
    /// run alerts, and minute-bucketed sparklines.
    #[must_use]
    pub fn dashboard(&self) -> Dashboard {
        let now = self.time.now();

        let mut active_runs: Vec<Run> = self
            .data
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Running)
            .cloned()
            .collect();
        active_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
        active_runs.truncate(6);

        let mut recent_deploys = self.list_deployments();
        recent_deploys.truncate(6);

        let mut alerts: Vec<DashboardAlert> = Vec::new();
        for run in self.data.runs.values() {
            let Some(run_series) = self.data.run_data.get(&run.id) else {
                continue;
            };
            for event in &run_series.timeline {
                if event.event_type != TimelineEventType::Alert {
                    continue;
                }
                alerts.push(DashboardAlert {
                    id: format!(
                        "{}_{}",
                        run.id,
                        event.ts.to_rfc3339_opts(SecondsFormat::Millis, true)
                    ),
                    ts: event.ts,
                    title: event.title.clone(),
                    severity: event.severity.unwrap_or(Severity::Warning),
                    run_id: run.id.clone(),
                    experiment_id: run.experiment_id.clone(),
                });
            }
        }
        alerts.sort_by(|a, b| b.ts.cmp(&a.ts).then_with(|| a.id.cmp(&b.id)));
        alerts.truncate(8);

        Dashboard {
            active_runs,
            recent_deploys,
            alerts,
            sparklines: Sparklines {
                gpu_util: metrics::sparkline(&self.seed, "gpu_util", 60, now),
                throughput: metrics::sparkline(&self.seed, "throughput", 60, now),
            },
        }
    }
}

fn set_step_statuses(deployment: &mut Deployment, statuses: [RolloutStepStatus; 3]) {
    for (step, status) in deployment.rollout_steps.iter_mut().zip(statuses) {
        step.status = status;
    }
}
