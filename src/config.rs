use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::learned::WeightBounds;
use crate::resolver::ResolverSettings;
use crate::storage;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_FEEDBACK_THRESHOLD: f32 = 0.8;
const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.5;
const DEFAULT_TOP_K: usize = 5;
const DEFAULT_SYNONYM_THRESHOLD: f32 = 0.75;
const DEFAULT_MIN_WEIGHT: f32 = 0.1;
const DEFAULT_MAX_WEIGHT: f32 = 10.0;
const DEFAULT_EMBEDDING_BACKEND: &str = "fastembed";
const DEFAULT_HASHING_DIMENSIONS: usize = 256;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2000;
const DEFAULT_LOCK_RETRIES: u32 = 3;
const DEFAULT_HISTORY_SIZE: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field}: {message}")]
    Invalid { field: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Yaml(#[from] serde_yml::Error),
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Pipeline thresholds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum similarity for replaying past feedback [0.0, 1.0]
    #[serde(default = "default_feedback_threshold")]
    pub feedback_threshold: f32,

    /// Minimum top score for semantic scoring to answer
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,

    /// Maximum number of tables returned by semantic scoring
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            feedback_threshold: DEFAULT_FEEDBACK_THRESHOLD,
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_feedback_threshold() -> f32 {
    DEFAULT_FEEDBACK_THRESHOLD
}

fn default_semantic_threshold() -> f32 {
    DEFAULT_SEMANTIC_THRESHOLD
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SynonymConfig {
    /// Column similarity needed to learn a new synonym [0.7, 0.8]
    #[serde(default = "default_synonym_threshold")]
    pub match_threshold: f32,
}

impl Default for SynonymConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_SYNONYM_THRESHOLD,
        }
    }
}

fn default_synonym_threshold() -> f32 {
    DEFAULT_SYNONYM_THRESHOLD
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeightConfig {
    #[serde(default = "default_min_weight")]
    pub min: f32,
    #[serde(default = "default_max_weight")]
    pub max: f32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_WEIGHT,
            max: DEFAULT_MAX_WEIGHT,
        }
    }
}

fn default_min_weight() -> f32 {
    DEFAULT_MIN_WEIGHT
}

fn default_max_weight() -> f32 {
    DEFAULT_MAX_WEIGHT
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "fastembed" or "hashing"
    #[serde(default = "default_embedding_backend")]
    pub backend: String,

    /// Model name for the fastembed backend (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector size of the hashing backend
    #[serde(default = "default_hashing_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_EMBEDDING_BACKEND.to_string(),
            model: crate::semantic::DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_HASHING_DIMENSIONS,
        }
    }
}

fn default_embedding_backend() -> String {
    DEFAULT_EMBEDDING_BACKEND.to_string()
}

fn default_embedding_model() -> String {
    crate::semantic::DEFAULT_MODEL.to_string()
}

fn default_hashing_dimensions() -> usize {
    DEFAULT_HASHING_DIMENSIONS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockConfig {
    /// Bounded wait for a store lock
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts before falling back to manual table selection
    #[serde(default = "default_lock_retries")]
    pub retries: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            retries: DEFAULT_LOCK_RETRIES,
        }
    }
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

fn default_lock_retries() -> u32 {
    DEFAULT_LOCK_RETRIES
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub synonyms: SynonymConfig,
    #[serde(default)]
    pub weights: WeightConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub locking: LockConfig,
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

fn default_history_size() -> usize {
    DEFAULT_HISTORY_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            synonyms: SynonymConfig::default(),
            weights: WeightConfig::default(),
            embedding: EmbeddingConfig::default(),
            locking: LockConfig::default(),
            history_size: DEFAULT_HISTORY_SIZE,
            base_path: PathBuf::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let resolver = &self.resolver;
        if !(0.0..=1.0).contains(&resolver.feedback_threshold) {
            return Err(ConfigError::invalid(
                "resolver.feedback_threshold",
                format!("must be between 0.0 and 1.0, got {}", resolver.feedback_threshold),
            ));
        }
        if !resolver.semantic_threshold.is_finite() || resolver.semantic_threshold < 0.0 {
            return Err(ConfigError::invalid(
                "resolver.semantic_threshold",
                format!("must be a non-negative number, got {}", resolver.semantic_threshold),
            ));
        }
        if resolver.top_k == 0 {
            return Err(ConfigError::invalid("resolver.top_k", "must be greater than 0"));
        }

        if !(0.7..=0.8).contains(&self.synonyms.match_threshold) {
            return Err(ConfigError::invalid(
                "synonyms.match_threshold",
                format!("must be between 0.7 and 0.8, got {}", self.synonyms.match_threshold),
            ));
        }

        let weights = &self.weights;
        if !(weights.min > 0.0 && weights.min <= 1.0 && weights.max >= 1.0 && weights.max.is_finite()) {
            return Err(ConfigError::invalid(
                "weights",
                format!("need 0 < min <= 1 <= max, got min {} max {}", weights.min, weights.max),
            ));
        }

        match self.embedding.backend.as_str() {
            "fastembed" | "hashing" => {}
            other => {
                return Err(ConfigError::invalid(
                    "embedding.backend",
                    format!("must be 'fastembed' or 'hashing', got '{other}'"),
                ))
            }
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::invalid("embedding.dimensions", "must be greater than 0"));
        }

        if self.locking.timeout_ms == 0 {
            return Err(ConfigError::invalid("locking.timeout_ms", "must be greater than 0"));
        }
        if self.locking.retries == 0 {
            return Err(ConfigError::invalid("locking.retries", "must be at least 1"));
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults if
    /// missing and rewriting it when defaults were filled in.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        let path = base_path.join(CONFIG_FILE);

        if !path.exists() {
            storage::write_atomic(&path, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str = std::fs::read_to_string(&path)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;
        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_str = serde_yml::to_string(&self)?;
        storage::write_atomic(&self.base_path.join(CONFIG_FILE), config_str.as_bytes())?;
        Ok(())
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            feedback_threshold: self.resolver.feedback_threshold,
            semantic_threshold: self.resolver.semantic_threshold,
            top_k: self.resolver.top_k,
        }
    }

    pub fn weight_bounds(&self) -> WeightBounds {
        WeightBounds {
            min: self.weights.min,
            max: self.weights.max,
        }
    }
}
