//! Engine configuration file types and loading.

use std::path::Path;

use faceid_vecstore::{Metric, validate_collection_name};
use serde::{Deserialize, Serialize};

use crate::engine::{DEFAULT_COLLECTION, DEFAULT_THRESHOLD};
use crate::error::ConfigError;

/// Top-level configuration file structure.
///
/// ```yaml
/// collection: faces
/// threshold: 0.40
/// embedder:
///   provider: deepface
///   model: Facenet512
///   detector: retinaface
///   base_url: http://localhost:5005
/// store:
///   provider: qdrant
///   url: ${QDRANT_URL}
///   metric: cosine
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Minimum similarity for an authentication to be accepted.
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    pub embedder: EmbedderConfig,
    pub store: StoreConfig,
}

/// Which embedding provider to build and how to configure it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedderConfig {
    pub provider: String,
    pub model: String,
    pub detector: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    /// Overrides the model's declared output size when non-zero.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub dimension: usize,
}

/// Which vector backend to build and the collection schema to request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(default = "default_metric")]
    pub metric: Metric,
    /// Collection vector size; 0 uses the embedder's output size.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub dimension: usize,
    /// Chunk size for batch enrollment; 0 uses the store default.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub batch_size: usize,
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_metric() -> Metric {
    Metric::Cosine
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Expand environment variable references in a string.
///
/// POSIX shell expansion semantics:
///   - `$$` → literal `$`
///   - `${VAR}` → value of environment variable VAR
///   - `$VAR` → value of environment variable VAR
///     (identifier = `[a-zA-Z_][a-zA-Z0-9_]*`)
///   - Unset variables expand to the empty string
pub fn expand_env(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        match chars.peek() {
            None => result.push('$'),
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                let name: String = chars.by_ref().take_while(|&c| c != '}').collect();
                result.push_str(&std::env::var(&name).unwrap_or_default());
            }
            Some(&c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                result.push_str(&std::env::var(&name).unwrap_or_default());
            }
            Some(_) => result.push('$'),
        }
    }

    result
}

impl Config {
    /// Parse a YAML document. Env references in URLs and keys are expanded.
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        let cfg: Config =
            serde_yaml::from_str(data).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.finish()
    }

    /// Parse a JSON document. Env references in URLs and keys are expanded.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let cfg: Config =
            serde_json::from_str(data).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.finish()
    }

    /// Load a config file; the format follows the extension (yaml, yml, json).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "json" => Self::from_json(&data),
            "yaml" | "yml" => Self::from_yaml(&data),
            _ => Err(ConfigError::Parse(format!(
                "unsupported config extension: {ext:?}"
            ))),
        }
    }

    fn finish(mut self) -> Result<Self, ConfigError> {
        self.embedder.base_url = expand_env(&self.embedder.base_url);
        self.embedder.api_key = expand_env(&self.embedder.api_key);
        self.store.url = expand_env(&self.store.url);
        self.store.api_key = expand_env(&self.store.api_key);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_collection_name(&self.collection).map_err(|_| {
            ConfigError::Invalid(format!(
                "collection name {:?} must be non-empty and use only [A-Za-z0-9_.-]",
                self.collection
            ))
        })?;
        if !self.threshold.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if self.embedder.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("embedder.provider is required".into()));
        }
        if self.embedder.model.trim().is_empty() {
            return Err(ConfigError::Invalid("embedder.model is required".into()));
        }
        if self.embedder.detector.trim().is_empty() {
            return Err(ConfigError::Invalid("embedder.detector is required".into()));
        }
        if self.store.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("store.provider is required".into()));
        }
        Ok(())
    }

    /// Vector size of the collection: the explicit store dimension, else the
    /// embedder's declared output size.
    pub fn collection_size(&self, embedder_dim: Option<usize>) -> Result<usize, ConfigError> {
        match (self.store.dimension, embedder_dim) {
            (0, Some(d)) => Ok(d),
            (0, None) => Err(ConfigError::Invalid(
                "store.dimension is required when the embedder declares no size".into(),
            )),
            (d, _) => Ok(d),
        }
    }
}
