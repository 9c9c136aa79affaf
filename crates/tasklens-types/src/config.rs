//! Configuration loading for tasklens.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/tasklens/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::TaskLensError;

/// Generative model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Provider name ("openai", "anthropic", "ollama", "none")
    #[serde(default = "default_model_provider")]
    pub provider: String,

    /// Model name (e.g., "llama3", "gpt-4o-mini")
    #[serde(default = "default_model_name")]
    pub model: String,

    /// API key (loaded from env var, not stored in config file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Upper bound for a single model call, including retries.
    #[serde(default = "default_model_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_model_provider() -> String {
    "ollama".to_string()
}

fn default_model_name() -> String {
    "llama3".to_string()
}

fn default_model_timeout() -> u64 {
    20_000
}

fn default_max_retries() -> u32 {
    2
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: default_model_provider(),
            model: default_model_name(),
            api_key: None,
            api_base_url: None,
            timeout_ms: default_model_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl ModelSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// True when a generative model is configured at all.
    pub fn is_enabled(&self) -> bool {
        !self.provider.eq_ignore_ascii_case("none")
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Candidates requested from the vector store when one structural filter is set.
    #[serde(default = "default_hybrid_top_k")]
    pub hybrid_top_k: usize,

    /// Candidates requested from the vector store when no structural filter is set.
    #[serde(default = "default_semantic_top_k")]
    pub semantic_top_k: usize,

    /// Upper bound for a single store call.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// Documents per `add_documents` call during ingestion.
    #[serde(default = "default_ingest_batch_size")]
    pub ingest_batch_size: usize,
}

fn default_hybrid_top_k() -> usize {
    50
}

fn default_semantic_top_k() -> usize {
    25
}

fn default_store_timeout() -> u64 {
    5_000
}

fn default_ingest_batch_size() -> usize {
    50
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            hybrid_top_k: default_hybrid_top_k(),
            semantic_top_k: default_semantic_top_k(),
            store_timeout_ms: default_store_timeout(),
            ingest_batch_size: default_ingest_batch_size(),
        }
    }
}

impl RetrievalSettings {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.hybrid_top_k == 0 || self.semantic_top_k == 0 {
            return Err("top_k values must be > 0".to_string());
        }
        if self.store_timeout_ms == 0 {
            return Err("store_timeout_ms must be > 0".to_string());
        }
        if self.ingest_batch_size == 0 {
            return Err("ingest_batch_size must be > 0".to_string());
        }
        Ok(())
    }
}

/// Thresholds for deciding whether a query needs the generative model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Queries shorter than this (in characters) go to the model.
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Queries with more tokens than this go to the model.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Matching this many distinct categories at once sends the query to the model.
    #[serde(default = "default_category_threshold")]
    pub category_threshold: usize,
}

fn default_min_length() -> usize {
    3
}

fn default_max_tokens() -> usize {
    8
}

fn default_category_threshold() -> usize {
    3
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_tokens: default_max_tokens(),
            category_threshold: default_category_threshold(),
        }
    }
}

impl ClassifierSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens == 0 {
            return Err("max_tokens must be > 0".to_string());
        }
        if self.category_threshold == 0 {
            return Err("category_threshold must be > 0".to_string());
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// JSON corpus export loaded at startup
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,

    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub classifier: ClassifierSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_corpus_path() -> String {
    ProjectDirs::from("", "", "tasklens")
        .map(|p| p.data_local_dir().join("tasks.json"))
        .unwrap_or_else(|| PathBuf::from("./tasks.json"))
        .to_string_lossy()
        .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            corpus_path: default_corpus_path(),
            model: ModelSettings::default(),
            retrieval: RetrievalSettings::default(),
            classifier: ClassifierSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/tasklens/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (TASKLENS_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TaskLensError> {
        let config_dir = ProjectDirs::from("", "", "tasklens")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(|e| TaskLensError::Config(e.to_string()))?
            .set_default("corpus_path", default_corpus_path())
            .map_err(|e| TaskLensError::Config(e.to_string()))?
            .set_default("model.provider", default_model_provider())
            .map_err(|e| TaskLensError::Config(e.to_string()))?
            .set_default("model.model", default_model_name())
            .map_err(|e| TaskLensError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: TASKLENS_LOG_LEVEL, TASKLENS_MODEL__PROVIDER, TASKLENS_RETRIEVAL__HYBRID_TOP_K
        builder = builder.add_source(
            Environment::with_prefix("TASKLENS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| TaskLensError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| TaskLensError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate every sub-config.
    pub fn validate(&self) -> Result<(), TaskLensError> {
        self.retrieval.validate().map_err(TaskLensError::Config)?;
        self.classifier.validate().map_err(TaskLensError::Config)?;
        Ok(())
    }

    /// Expand a leading `~/` in the corpus path.
    pub fn expanded_corpus_path(&self) -> PathBuf {
        if let Some(rest) = self.corpus_path.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new() {
                return home.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.corpus_path)
    }
}
