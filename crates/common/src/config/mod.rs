//! Configuration management for DocRAG services
//!
//! Supports loading configuration from:
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Environment variables (prefixed with APP__)
//! - Legacy deployment variables (RAG_INDEX_BUCKET, RAG_TOP_K, ...)
//! - Default values
//!
//! `RAG_INDEX_BUCKET` applies to both index variants. `RAG_INDEX_KEY` and
//! `RAG_INDEX_LOCAL` name a single object, so they only override the variant
//! selected by `retrieval.mode`; the other keeps its own default.

use crate::errors::{AppError, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Index sources, one per retrieval strategy
    #[serde(default)]
    pub index: IndexConfig,

    /// Retrieval tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// AWS client configuration
    #[serde(default)]
    pub aws: AwsConfig,

    /// Prompt configuration
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Keyword index (no embeddings required)
    #[serde(default = "default_lexical_source")]
    pub lexical: IndexSourceConfig,

    /// Embeddings index
    #[serde(default = "default_semantic_source")]
    pub semantic: IndexSourceConfig,
}

/// Where one index variant lives. S3 is tried first, then the local file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexSourceConfig {
    /// S3 bucket (remote source disabled when unset)
    pub bucket: Option<String>,

    /// S3 object key
    pub key: String,

    /// Local file fallback
    pub local_path: String,
}

/// Which retrieval strategy a request uses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    Lexical,
    Semantic,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Disable to skip augmentation entirely
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Strategy used by `RetrievalEngine::retrieve`
    #[serde(default = "default_strategy")]
    pub mode: RetrievalStrategy,

    /// Maximum chunks handed to the context assembler
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for semantic results
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Serve lexical results when the embedding provider fails
    #[serde(default = "default_enabled")]
    pub fallback_to_lexical: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: bedrock, openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service (openai)
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Input is cut to this many characters before submission
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    /// Base system prompt; retrieved context is appended to it
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// Default system prompt for the documentation assistant
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant for a technical documentation site.
Use the provided context from the documentation to answer questions accurately.
If the context doesn't contain relevant information, say so and provide general guidance.
Always be concise and cite specific documentation sections when possible.";

// Default value functions
fn default_lexical_source() -> IndexSourceConfig {
    IndexSourceConfig {
        bucket: None,
        key: "rag-index.json".to_string(),
        local_path: "/var/task/rag-index.json".to_string(),
    }
}
fn default_semantic_source() -> IndexSourceConfig {
    IndexSourceConfig {
        bucket: None,
        key: "rag-index-embeddings.json".to_string(),
        local_path: "/var/task/rag-index-embeddings.json".to_string(),
    }
}
fn default_enabled() -> bool { true }
fn default_strategy() -> RetrievalStrategy { RetrievalStrategy::Lexical }
fn default_top_k() -> usize { 5 }
fn default_similarity_threshold() -> f32 { 0.5 }
fn default_embedding_provider() -> String { "bedrock".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 10 }
fn default_max_input_chars() -> usize { crate::embeddings::MAX_INPUT_CHARS }
fn default_region() -> String { "us-east-1".to_string() }
fn default_system_prompt() -> String { DEFAULT_SYSTEM_PROMPT.to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "docrag".to_string() }

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            lexical: default_lexical_source(),
            semantic: default_semantic_source(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            mode: default_strategy(),
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            fallback_to_lexical: default_enabled(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self { region: default_region() }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { system_prompt: default_system_prompt() }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            aws: AwsConfig::default(),
            prompt: PromptConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Legacy single-variable settings and the config keys they override.
/// `{mode}` is replaced with the configured retrieval mode.
const LEGACY_ENV_OVERRIDES: &[(&str, &[&str])] = &[
    ("RAG_INDEX_BUCKET", &["index.lexical.bucket", "index.semantic.bucket"]),
    ("RAG_INDEX_KEY", &["index.{mode}.key"]),
    ("RAG_INDEX_LOCAL", &["index.{mode}.local_path"]),
    ("RAG_TOP_K", &["retrieval.top_k"]),
    ("SIMILARITY_THRESHOLD", &["retrieval.similarity_threshold"]),
    ("EMBEDDING_MODEL_ID", &["embedding.model"]),
    ("SYSTEM_PROMPT", &["prompt.system_prompt"]),
    ("AWS_REGION", &["aws.region"]),
];

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = with_index_defaults(Config::builder())?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__TOP_K=8
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            );

        let mode = builder
            .build_cloned()?
            .get_string("retrieval.mode")
            .unwrap_or_else(|_| "lexical".to_string());

        for (var, keys) in LEGACY_ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                for key in *keys {
                    builder = builder.set_override(key.replace("{mode}", &mode), value.clone())?;
                }
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = with_index_defaults(Config::builder())?
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the retrieval core cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(invalid("retrieval.top_k", "must be a positive integer"));
        }

        let threshold = self.retrieval.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(invalid(
                "retrieval.similarity_threshold",
                &format!("{} is outside [-1, 1]", threshold),
            ));
        }

        if self.embedding.max_input_chars == 0 {
            return Err(invalid("embedding.max_input_chars", "must be positive"));
        }

        if self.embedding.provider == "openai" && self.embedding.api_key.is_none() {
            return Err(invalid("embedding.api_key", "required for the openai provider"));
        }

        Ok(())
    }

    /// Get embedding timeout as Duration
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }
}

/// Per-field index defaults, so a partial `index.*` table (a bucket alone,
/// say) still deserializes.
fn with_index_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
    let lexical = default_lexical_source();
    let semantic = default_semantic_source();

    builder
        .set_default("index.lexical.key", lexical.key)?
        .set_default("index.lexical.local_path", lexical.local_path)?
        .set_default("index.semantic.key", semantic.key)?
        .set_default("index.semantic.local_path", semantic.local_path)
}

fn invalid(field: &str, message: &str) -> AppError {
    AppError::Validation {
        message: format!("{}: {}", field, message),
        field: Some(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.similarity_threshold, 0.5);
        assert_eq!(config.retrieval.mode, RetrievalStrategy::Lexical);
        assert_eq!(config.embedding.model, "amazon.titan-embed-text-v2:0");
        assert_eq!(config.embedding.max_input_chars, 8000);
        assert_eq!(config.index.lexical.key, "rag-index.json");
        assert_eq!(config.index.semantic.key, "rag-index-embeddings.json");
        assert!(config.index.lexical.bucket.is_none());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retrieval.top_k"));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_openai_requires_key() {
        let mut config = AppConfig::default();
        config.embedding.provider = "openai".to_string();
        assert!(config.validate().is_err());

        config.embedding.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docrag.toml");
        std::fs::write(
            &path,
            "[retrieval]\nmode = \"semantic\"\ntop_k = 3\n\n[index.semantic]\nbucket = \"docs-bucket\"\nkey = \"idx.json\"\nlocal_path = \"/tmp/idx.json\"\n",
        )
        .unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.retrieval.mode, RetrievalStrategy::Semantic);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.similarity_threshold, 0.5);
        assert_eq!(config.index.semantic.bucket.as_deref(), Some("docs-bucket"));
        assert_eq!(config.index.lexical.key, "rag-index.json");
    }

    #[test]
    fn test_from_file_bucket_only_keeps_default_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docrag.toml");
        std::fs::write(&path, "[index.semantic]\nbucket = \"docs-bucket\"\n").unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.index.semantic.bucket.as_deref(), Some("docs-bucket"));
        assert_eq!(config.index.semantic.key, "rag-index-embeddings.json");
        assert_eq!(config.index.semantic.local_path, "/var/task/rag-index-embeddings.json");
        assert!(config.index.lexical.bucket.is_none());
        assert_eq!(config.index.lexical.key, "rag-index.json");
    }

    // The only test that touches process environment; keep env-driven
    // assertions here so parallel tests never observe each other's variables.
    #[test]
    fn test_legacy_env_overrides() {
        let vars = [
            "RAG_INDEX_BUCKET",
            "RAG_INDEX_KEY",
            "RAG_TOP_K",
            "SIMILARITY_THRESHOLD",
            "APP__RETRIEVAL__MODE",
        ];

        // bucket alone, as a typical deployment sets it
        std::env::set_var("RAG_INDEX_BUCKET", "docs-bucket");
        let config = AppConfig::load().unwrap();
        assert_eq!(config.index.lexical.bucket.as_deref(), Some("docs-bucket"));
        assert_eq!(config.index.semantic.bucket.as_deref(), Some("docs-bucket"));
        assert_eq!(config.index.lexical.key, "rag-index.json");
        assert_eq!(config.index.semantic.key, "rag-index-embeddings.json");

        // numbers arrive as strings
        std::env::set_var("RAG_TOP_K", "8");
        std::env::set_var("SIMILARITY_THRESHOLD", "0.35");
        let config = AppConfig::load().unwrap();
        assert_eq!(config.retrieval.top_k, 8);
        assert!((config.retrieval.similarity_threshold - 0.35).abs() < 1e-6);

        // the object key follows the configured mode only
        std::env::set_var("APP__RETRIEVAL__MODE", "semantic");
        std::env::set_var("RAG_INDEX_KEY", "custom-embeddings.json");
        let config = AppConfig::load().unwrap();
        assert_eq!(config.retrieval.mode, RetrievalStrategy::Semantic);
        assert_eq!(config.index.semantic.key, "custom-embeddings.json");
        assert_eq!(config.index.lexical.key, "rag-index.json");

        for var in vars {
            std::env::remove_var(var);
        }
    }
}
