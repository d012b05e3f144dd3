//! Training config authoring: config versions, templates, and the typed
//! config document with its parsing and validation rules.
//!
//! Raw config text comes in as YAML or JSON. Parsing failures (the text is
//! not valid in its declared format) and schema failures (parsed but
//! structurally or semantically invalid) are distinct error classes because
//! callers surface them under different error codes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format a config document is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigLanguage {
    Yaml,
    Json,
}

impl ConfigLanguage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

/// An immutable snapshot of config text.
///
/// # Invariants
///
/// - `parent_id`, if present, references an earlier version of the same
///   template lineage. The chain is singly linked and never cyclic: versions
///   are only appended, and a new version can only point at an id that
///   already exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigVersion {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub language: ConfigLanguage,
    pub content: String,
    pub schema_version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// A starting-point config with a version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoringTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub language: ConfigLanguage,
    pub latest_config_version_id: String,
}

/// The typed shape of an authoring config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoringConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub training: TrainingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSection {
    pub dataset: DatasetRef,
    pub compute: ComputeSpec,
    pub hyperparams: Hyperparams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeSpec {
    pub gpu_type: String,
    pub gpus: i64,
    #[serde(default = "default_true")]
    pub mixed_precision: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hyperparams {
    pub learning_rate: f64,
    pub batch_size: i64,
    pub epochs: i64,
}

const fn default_true() -> bool {
    true
}

/// One structural or semantic violation, located by field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

/// Why a config document was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The text is not valid in its declared format.
    Parse(String),
    /// The text parsed but fails structural/semantic validation.
    Schema(Vec<FieldError>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "config parse error: {message}"),
            Self::Schema(errors) => write!(f, "config failed schema validation ({} errors)", errors.len()),
        }
    }
}

impl std::error::Error for ConfigError {}

impl AuthoringConfig {
    /// Parse and validate raw config text in the declared language.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` when the text is not valid YAML/JSON,
    /// `ConfigError::Schema` when it parses but violates the schema.
    pub fn from_text(language: ConfigLanguage, content: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = match language {
            ConfigLanguage::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            ConfigLanguage::Yaml => {
                serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
        };
        let config: Self = serde_json::from_value(value).map_err(|e| {
            ConfigError::Schema(vec![FieldError {
                path: String::new(),
                message: e.to_string(),
            }])
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the semantic constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// `ConfigError::Schema` carrying one entry per violated field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let mut require = |ok: bool, path: &str, message: &str| {
            if !ok {
                errors.push(FieldError {
                    path: path.to_owned(),
                    message: message.to_owned(),
                });
            }
        };

        require(!self.name.is_empty(), "name", "must not be empty");
        require(!self.owner.is_empty(), "owner", "must not be empty");
        require(
            !self.training.dataset.name.is_empty(),
            "training.dataset.name",
            "must not be empty",
        );
        require(
            !self.training.dataset.version.is_empty(),
            "training.dataset.version",
            "must not be empty",
        );
        require(
            !self.training.compute.gpu_type.is_empty(),
            "training.compute.gpuType",
            "must not be empty",
        );
        require(
            (1..=32).contains(&self.training.compute.gpus),
            "training.compute.gpus",
            "must be between 1 and 32",
        );
        require(
            self.training.hyperparams.learning_rate > 0.0,
            "training.hyperparams.learningRate",
            "must be positive",
        );
        require(
            self.training.hyperparams.batch_size >= 1,
            "training.hyperparams.batchSize",
            "must be at least 1",
        );
        require(
            (1..=200).contains(&self.training.hyperparams.epochs),
            "training.hyperparams.epochs",
            "must be between 1 and 200",
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Schema(errors))
        }
    }

    /// Serialize the config back to text in the given language.
    ///
    /// # Errors
    ///
    /// Returns the serializer's message; this cannot happen for a config that
    /// came out of `from_text`, but the store propagates rather than panics.
    pub fn to_text(&self, language: ConfigLanguage) -> Result<String, String> {
        match language {
            ConfigLanguage::Json => {
                serde_json::to_string_pretty(self).map_err(|e| e.to_string())
            }
            ConfigLanguage::Yaml => serde_yaml::to_string(self).map_err(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_json() -> String {
        r#"{
            "name": "trainer/amber-otter-42",
            "owner": "deb",
            "tags": ["baseline"],
            "training": {
                "dataset": {"name": "support_intents_v2", "version": "v3.1"},
                "compute": {"gpuType": "A100-80GB", "gpus": 4, "mixedPrecision": true},
                "hyperparams": {"learningRate": 0.0006, "batchSize": 64, "epochs": 8}
            }
        }"#
        .to_owned()
    }

    #[test]
    fn test_parse_valid_json() {
        let config = AuthoringConfig::from_text(ConfigLanguage::Json, &valid_json()).unwrap();
        assert_eq!(config.owner, "deb");
        assert_eq!(config.training.compute.gpus, 4);
    }

    #[test]
    fn test_parse_valid_yaml() {
        let yaml = "\
name: trainer/x
owner: sara
training:
  dataset:
    name: fraud_graph_v5
    version: v2.0
  compute:
    gpuType: L40S
    gpus: 2
  hyperparams:
    learningRate: 0.0003
    batchSize: 32
    epochs: 5
";
        let config = AuthoringConfig::from_text(ConfigLanguage::Yaml, yaml).unwrap();
        // Defaults apply when omitted.
        assert!(config.training.compute.mixed_precision);
        assert!(config.tags.is_empty());
    }

    #[test]
    fn test_invalid_syntax_is_parse_error() {
        let err = AuthoringConfig::from_text(ConfigLanguage::Json, "{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_section_is_schema_error() {
        let err = AuthoringConfig::from_text(ConfigLanguage::Json, r#"{"name":"x"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Schema(_)));
    }

    #[test]
    fn test_range_violations_reported_per_field() {
        let text = valid_json()
            .replace("\"gpus\": 4", "\"gpus\": 64")
            .replace("\"epochs\": 8", "\"epochs\": 500");
        let err = AuthoringConfig::from_text(ConfigLanguage::Json, &text).unwrap_err();
        let ConfigError::Schema(errors) = err else {
            panic!("expected schema error");
        };
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"training.compute.gpus"));
        assert!(paths.contains(&"training.hyperparams.epochs"));
    }

    #[test]
    fn test_round_trip_json() {
        let config = AuthoringConfig::from_text(ConfigLanguage::Json, &valid_json()).unwrap();
        let text = config.to_text(ConfigLanguage::Json).unwrap();
        let again = AuthoringConfig::from_text(ConfigLanguage::Json, &text).unwrap();
        assert_eq!(config, again);
    }
}
