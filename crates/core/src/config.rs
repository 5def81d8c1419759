//! Configuration management for ragdex.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.ragdex/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with index state stored in `.ragdex/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

/// Embedding providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the workspace root (contains .ragdex/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log line format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Indexing and retrieval settings
    pub retrieval: RetrievalConfig,
}

/// Indexing and retrieval settings (`retrieval:` section of config.yaml).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Root directory for named indexes; relative paths resolve against the workspace
    #[serde(default)]
    pub index_dir: Option<PathBuf>,

    /// Chunk window in characters
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Overlap between consecutive windows in characters
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Default number of results per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Results scoring below this are dropped
    #[serde(default)]
    pub min_score: Option<f32>,

    /// Maximum snippet length in characters
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// File extensions picked up by the folder loader (without dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Embedding provider settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Endpoint for remote providers
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout for remote providers
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_window_size() -> usize {
    1200
}

fn default_overlap() -> usize {
    150
}

fn default_top_k() -> usize {
    5
}

fn default_snippet_chars() -> usize {
    240
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string()]
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    64
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_dir: None,
            window_size: default_window_size(),
            overlap: default_overlap(),
            top_k: default_top_k(),
            min_score: None,
            snippet_chars: default_snippet_chars(),
            extensions: default_extensions(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    retrieval: Option<RetrievalConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            log_format: LogFormat::Text,
            verbose: false,
            no_color: false,
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `RAGDEX_WORKSPACE`: Override workspace path
    /// - `RAGDEX_CONFIG`: Path to config file
    /// - `RAGDEX_INDEX_DIR`: Root directory for named indexes
    /// - `RAGDEX_EMBEDDING_PROVIDER`: Embedding provider
    /// - `RAGDEX_EMBEDDING_MODEL`: Embedding model
    /// - `RAGDEX_EMBEDDING_ENDPOINT`: Endpoint for remote providers
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use ragdex_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let workspace = std::env::var("RAGDEX_WORKSPACE").ok().map(PathBuf::from);
        let config_file = std::env::var("RAGDEX_CONFIG").ok().map(PathBuf::from);
        Self::load_from(workspace, config_file)
    }

    /// Load configuration for an explicit workspace and config file.
    ///
    /// Either argument falls back to the default when `None`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }
        config.config_file = config_file;

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.ragdex_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(index_dir) = std::env::var("RAGDEX_INDEX_DIR") {
            config.retrieval.index_dir = Some(PathBuf::from(index_dir));
        }

        if let Ok(provider) = std::env::var("RAGDEX_EMBEDDING_PROVIDER") {
            config.retrieval.embedding.provider = provider;
        }

        if let Ok(model) = std::env::var("RAGDEX_EMBEDDING_MODEL") {
            config.retrieval.embedding.model = model;
        }

        if let Ok(endpoint) = std::env::var("RAGDEX_EMBEDDING_ENDPOINT") {
            config.retrieval.embedding.endpoint = Some(endpoint);
        }

        if config.log_level.is_none() {
            config.log_level = std::env::var("RUST_LOG").ok();
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format.parse()?;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        log_format: Option<LogFormat>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if let Some(log_format) = log_format {
            self.log_format = log_format;
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .ragdex directory.
    pub fn ragdex_dir(&self) -> PathBuf {
        self.workspace.join(".ragdex")
    }

    /// Root directory holding all named indexes.
    pub fn index_dir(&self) -> PathBuf {
        match self.retrieval.index_dir {
            Some(ref dir) if dir.is_absolute() => dir.clone(),
            Some(ref dir) => self.workspace.join(dir),
            None => self.ragdex_dir().join("index"),
        }
    }

    /// Ensure the .ragdex directory exists.
    pub fn ensure_ragdex_dir(&self) -> AppResult<()> {
        let dir = self.ragdex_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .ragdex directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Validate the retrieval settings.
    pub fn validate(&self) -> AppResult<()> {
        self.retrieval.validate()
    }
}

impl RetrievalConfig {
    /// Check chunking, search and embedding parameters.
    pub fn validate(&self) -> AppResult<()> {
        validate_window(self.window_size, self.overlap)?;

        if self.top_k == 0 {
            return Err(AppError::InvalidConfiguration(
                "topK must be greater than zero".to_string(),
            ));
        }

        if self.extensions.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "at least one loader extension is required".to_string(),
            ));
        }

        self.embedding.validate()
    }
}

impl EmbeddingConfig {
    /// Check provider name, dimensions and batch size.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::InvalidConfiguration(format!(
                "Unknown embedding provider: '{}'. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.dimensions == 0 {
            return Err(AppError::InvalidConfiguration(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(AppError::InvalidConfiguration(
                "embedding batchSize must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Check the chunk window constraints: `window_size > 0` and `overlap < window_size`.
pub fn validate_window(window_size: usize, overlap: usize) -> AppResult<()> {
    if window_size == 0 {
        return Err(AppError::InvalidConfiguration(
            "window size must be greater than zero".to_string(),
        ));
    }

    if overlap >= window_size {
        return Err(AppError::InvalidConfiguration(format!(
            "overlap ({}) must be smaller than window size ({})",
            overlap, window_size
        )));
    }

    Ok(())
}
