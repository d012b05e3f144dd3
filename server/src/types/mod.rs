pub mod authoring;
pub mod deployment;
pub mod experiment;
pub mod registry;
pub mod run;
pub mod stream;
pub mod telemetry;
pub mod trace;

pub use authoring::{AuthoringConfig, AuthoringTemplate, ConfigLanguage, ConfigVersion};
pub use deployment::{
    Deployment, DeploymentStage, DeploymentStatus, Incident, IncidentSeverity, RolloutStep,
    RolloutStepStatus,
};
pub use experiment::Experiment;
pub use registry::{EvalSummary, Model, ModelVersion, ModelVersionStage};
pub use run::{Artifact, ArtifactKind, Run, RunMeta, RunStatus, RunWithTimeline};
pub use stream::RunStreamEvent;
pub use telemetry::{LogLevel, LogLine, MetricPoint, Severity, TimelineEvent, TimelineEventType};
pub use trace::{Trace, TraceStep, TraceStepKind, TraceStepStatus};
