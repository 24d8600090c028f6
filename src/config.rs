use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Artifact storage configuration
    #[serde(default)]
    pub artifacts: ArtifactStoreConfig,

    /// Model lifecycle configuration
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Text encoder configuration
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Resolution recommendation configuration
    #[serde(default)]
    pub recommendation: RecommendationConfig,

    /// SLA policy and risk model training configuration
    #[serde(default)]
    pub sla: SlaConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: TICKIT_)
            .add_source(
                config::Environment::with_prefix("TICKIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStoreConfig {
    /// Storage backend type
    #[serde(default)]
    pub backend: ArtifactBackend,

    /// Directory (filesystem) or database path (sled)
    pub path: Option<PathBuf>,
}

impl Default for ArtifactStoreConfig {
    fn default() -> Self {
        Self {
            backend: ArtifactBackend::Filesystem,
            path: Some(PathBuf::from("./data/models")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactBackend {
    #[default]
    Filesystem,
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Initialize models at startup or on first request
    #[serde(default)]
    pub init_mode: InitMode,

    /// Bound on the encode + search / predict path (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// How long a request waits for an in-progress initialization (milliseconds)
    #[serde(default = "default_init_wait_ms")]
    pub init_wait_ms: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            init_mode: InitMode::default(),
            request_timeout_ms: default_request_timeout_ms(),
            init_wait_ms: default_init_wait_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    #[default]
    Eager,
    Lazy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Encoder implementation
    #[serde(default)]
    pub kind: EncoderKind,

    /// Output vector dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Include character trigrams in the hashed feature set
    #[serde(default = "default_true")]
    pub char_ngrams: bool,

    /// Sentence-transformer directory holding config.json, tokenizer.json
    /// and model.safetensors (candle kind)
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Token budget per text; longer inputs are truncated (candle kind)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            kind: EncoderKind::default(),
            dimension: default_embedding_dimension(),
            char_ngrams: true,
            model_dir: default_model_dir(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    /// Feature hashing; no model files, fast and fully offline
    #[default]
    Hashing,
    /// BERT-style sentence encoder (all-MiniLM-L6-v2) run with candle
    Candle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Number of recommendations returned when the caller does not ask for a count
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    /// Minimum trimmed description length (characters)
    #[serde(default = "default_min_description_chars")]
    pub min_description_chars: usize,

    /// Lower bound on the number of candidates fetched from the index
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,

    /// Squared-distance calibration for the similarity score.
    /// 2.0 assumes unit-norm embeddings; re-derive when swapping encoders.
    #[serde(default = "default_distance_scale")]
    pub distance_scale: f32,

    /// Lower bound of the fallback confidence band
    #[serde(default = "default_fallback_score_min")]
    pub fallback_score_min: f32,

    /// Upper bound of the fallback confidence band
    #[serde(default = "default_fallback_score_max")]
    pub fallback_score_max: f32,

    /// JSON file replacing the built-in knowledge base
    pub knowledge_base_path: Option<PathBuf>,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_top_n: default_top_n(),
            min_description_chars: default_min_description_chars(),
            min_candidates: default_min_candidates(),
            distance_scale: default_distance_scale(),
            fallback_score_min: default_fallback_score_min(),
            fallback_score_max: default_fallback_score_max(),
            knowledge_base_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaConfig {
    /// Bumped whenever the windows change; persisted models trained on another version are rebuilt
    #[serde(default = "default_sla_version")]
    pub policy_version: u32,

    #[serde(default = "default_critical_hours")]
    pub critical_hours: f64,

    #[serde(default = "default_high_hours")]
    pub high_hours: f64,

    #[serde(default = "default_medium_hours")]
    pub medium_hours: f64,

    #[serde(default = "default_low_hours")]
    pub low_hours: f64,

    /// Synthetic training samples generated when the model must be built
    #[serde(default = "default_synthetic_samples")]
    pub synthetic_samples: usize,

    /// Share of synthetic samples drawn near or past the deadline
    #[serde(default = "default_near_deadline_ratio")]
    pub near_deadline_ratio: f64,

    /// Seed for synthetic data generation
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Ticket categories used for synthetic data
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            policy_version: default_sla_version(),
            critical_hours: default_critical_hours(),
            high_hours: default_high_hours(),
            medium_hours: default_medium_hours(),
            low_hours: default_low_hours(),
            synthetic_samples: default_synthetic_samples(),
            near_deadline_ratio: default_near_deadline_ratio(),
            seed: default_seed(),
            categories: default_categories(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "tickit-inference".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    2_000
}

fn default_init_wait_ms() -> u64 {
    5_000
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("./models/all-MiniLM-L6-v2")
}

fn default_max_tokens() -> usize {
    256
}

fn default_top_n() -> usize {
    3
}

fn default_min_description_chars() -> usize {
    5
}

fn default_min_candidates() -> usize {
    5
}

fn default_distance_scale() -> f32 {
    2.0
}

fn default_fallback_score_min() -> f32 {
    0.3
}

fn default_fallback_score_max() -> f32 {
    0.6
}

fn default_sla_version() -> u32 {
    1
}

fn default_critical_hours() -> f64 {
    4.0
}

fn default_high_hours() -> f64 {
    8.0
}

fn default_medium_hours() -> f64 {
    24.0
}

fn default_low_hours() -> f64 {
    48.0
}

fn default_synthetic_samples() -> usize {
    1000
}

fn default_near_deadline_ratio() -> f64 {
    0.3
}

fn default_seed() -> u64 {
    42
}

fn default_categories() -> Vec<String> {
    [
        "IT Support",
        "Bug",
        "Feature Request",
        "Security",
        "Network",
        "Software",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_top_n(), 3);
        assert_eq!(default_embedding_dimension(), 384);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_distance_scale(), 2.0);
        assert!(default_true());
    }

    #[test]
    fn test_default_modes() {
        assert_eq!(InitMode::default(), InitMode::Eager);
        assert_eq!(ArtifactBackend::default(), ArtifactBackend::Filesystem);
        assert_eq!(EncoderKind::default(), EncoderKind::Hashing);
    }

    #[test]
    fn test_sla_defaults_match_policy_table() {
        let sla = SlaConfig::default();
        assert_eq!(sla.critical_hours, 4.0);
        assert_eq!(sla.high_hours, 8.0);
        assert_eq!(sla.medium_hours, 24.0);
        assert_eq!(sla.low_hours, 48.0);
        assert_eq!(sla.categories.len(), 6);
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.recommendation.default_top_n, 3);
        assert_eq!(config.inference.init_mode, InitMode::Eager);
        assert_eq!(config.sla.synthetic_samples, 1000);
    }
}
