//! Training config synthesis and the built-in template catalog.

use crate::rng::{EmptyInputError, SeededRng};
use crate::types::ConfigLanguage;
use crate::types::authoring::{AuthoringConfig, ComputeSpec, DatasetRef, Hyperparams, TrainingSection};

use super::text::{
    BATCH_SIZES, CONFIG_TAGS, DATASETS, EPOCH_COUNTS, GPU_COUNTS, GPU_TYPES, OWNERS,
    format_run_name,
};

/// Draw a fresh, valid config. Fields the caller wants to pin (owner, name)
/// are overwritten after the draw.
pub fn make_config(rng: &mut SeededRng) -> Result<AuthoringConfig, EmptyInputError> {
    let owner = (*rng.pick(&OWNERS)?).to_owned();
    let dataset_name = (*rng.pick(&DATASETS)?).to_owned();
    let dataset_version = format!("v{}.{}", rng.random_int(2, 11), rng.random_int(0, 9));
    let name = format!("trainer/{}", format_run_name(rng)?);
    let tags = vec![
        (*rng.pick(&CONFIG_TAGS)?).to_owned(),
        format!("ds:{dataset_name}"),
    ];

    Ok(AuthoringConfig {
        name,
        description: Some("Synthetic config generated for the telemetry demo.".to_owned()),
        owner,
        tags,
        training: TrainingSection {
            dataset: DatasetRef {
                name: dataset_name,
                version: dataset_version,
            },
            compute: ComputeSpec {
                gpu_type: (*rng.pick(&GPU_TYPES)?).to_owned(),
                gpus: *rng.pick(&GPU_COUNTS)?,
                mixed_precision: rng.chance(0.8),
            },
            hyperparams: Hyperparams {
                learning_rate: round6(rng.random_float(0.000_05, 0.0015)),
                batch_size: *rng.pick(&BATCH_SIZES)?,
                epochs: *rng.pick(&EPOCH_COUNTS)?,
            },
        },
    })
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// A partial override applied on top of a template's base config.
#[derive(Debug, Clone, Default)]
pub struct TemplateVariant {
    pub tags: Option<Vec<&'static str>>,
    pub compute: Option<ComputeSpec>,
    pub hyperparams: Option<Hyperparams>,
}

impl TemplateVariant {
    fn hyperparams(learning_rate: f64, batch_size: i64, epochs: i64) -> Self {
        Self {
            hyperparams: Some(Hyperparams {
                learning_rate,
                batch_size,
                epochs,
            }),
            ..Self::default()
        }
    }

    pub fn apply(&self, base: &AuthoringConfig) -> AuthoringConfig {
        let mut config = base.clone();
        if let Some(tags) = &self.tags {
            config.tags = tags.iter().map(|t| (*t).to_owned()).collect();
        }
        if let Some(compute) = &self.compute {
            config.training.compute = compute.clone();
        }
        if let Some(hyperparams) = &self.hyperparams {
            config.training.hyperparams = hyperparams.clone();
        }
        config
    }
}

/// One built-in authoring template.
pub struct TemplateSpec {
    pub title: &'static str,
    pub description: &'static str,
    pub language: ConfigLanguage,
    pub variants: Vec<TemplateVariant>,
}

/// The built-in template catalog, in creation order.
#[must_use]
pub fn template_specs() -> Vec<TemplateSpec> {
    vec![
        TemplateSpec {
            title: "Batch Trainer (baseline)",
            description: "A clean starting point with stable defaults and clear training metadata.",
            language: ConfigLanguage::Json,
            variants: vec![
                TemplateVariant::hyperparams(0.0006, 64, 8),
                TemplateVariant::hyperparams(0.0003, 128, 8),
                TemplateVariant {
                    compute: Some(ComputeSpec {
                        gpu_type: "H100-80GB".to_owned(),
                        gpus: 8,
                        mixed_precision: true,
                    }),
                    ..TemplateVariant::default()
                },
            ],
        },
        TemplateSpec {
            title: "Finetune Sweep (fast iterate)",
            description: "Aggressive learning rate and lower epoch count to quickly validate direction.",
            language: ConfigLanguage::Yaml,
            variants: vec![
                TemplateVariant::hyperparams(0.0012, 32, 3),
                TemplateVariant::hyperparams(0.0009, 32, 5),
                TemplateVariant::hyperparams(0.0007, 64, 5),
            ],
        },
        TemplateSpec {
            title: "Eval-Only (shadow run)",
            description: "Runs evaluation wiring and artifacts without changing training knobs.",
            language: ConfigLanguage::Json,
            variants: vec![
                TemplateVariant {
                    tags: Some(vec!["eval", "shadow"]),
                    ..TemplateVariant::hyperparams(0.0005, 64, 3)
                },
                TemplateVariant {
                    tags: Some(vec!["eval", "shadow"]),
                    ..TemplateVariant::hyperparams(0.0005, 64, 5)
                },
            ],
        },
    ]
}
