//! Configuration module for the retrieval pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `RAG_` and use double underscores
//! to separate nested levels:
//! - `RAG_CHUNKING__CHUNK_SIZE=500` sets `chunking.chunk_size`
//! - `RAG_RETRIEVAL__TOP_K=8` sets `retrieval.top_k`
//! - `RAG_EMBEDDING__MODEL=BGESmallENV15` sets `embedding.model`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::documents::ChunkingConfig;
use crate::index::Metric;

/// Directory holding settings and the default snapshot location.
pub const CONFIG_DIR: &str = ".ragcore";

/// Name of the settings file inside [`CONFIG_DIR`].
pub const SETTINGS_FILE: &str = "settings.toml";

/// Errors raised while loading, validating or saving settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration file already exists at {0}. Use --force to overwrite")]
    AlreadyExists(PathBuf),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path of the persisted index snapshot
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Workspace root directory (where .ragcore is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Source document discovery
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Chunk size and overlap
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Query-time settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Language-model endpoint used to answer questions
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Offline indexing settings
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DocumentsConfig {
    /// Glob patterns selecting source files (relative to the source directory)
    #[serde(default = "default_document_patterns")]
    pub patterns: Vec<String>,

    /// Glob patterns excluded from indexing
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Files larger than this are skipped and reported
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Number of chunks sent to the model per call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Where downloaded model files are cached (defaults to the user cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Show the model download progress bar
    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Distance metric used when building new indexes
    #[serde(default)]
    pub metric: Metric,

    /// Hits below this similarity are dropped by the CLI (0 keeps everything)
    #[serde(default)]
    pub min_similarity: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    /// Chat model name
    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of threads used for distance computation and batching
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Show progress bars during indexing
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `pipeline = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".ragcore/index.json")
}
fn default_document_patterns() -> Vec<String> {
    vec!["**/*.txt".to_string(), "**/*.md".to_string()]
}
fn default_max_file_bytes() -> u64 {
    16 * 1024 * 1024
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_top_k() -> usize {
    5
}
fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    500
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            workspace_root: None,
            documents: DocumentsConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            completion: CompletionConfig::default(),
            indexing: IndexingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            patterns: default_document_patterns(),
            ignore_patterns: vec![".git/**".to_string(), ".ragcore/**".to_string()],
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            metric: Metric::default(),
            min_similarity: 0.0,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            show_progress: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl EmbeddingConfig {
    /// Directory where model files are cached.
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("ragcore")
                .join("models")
        })
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(SETTINGS_FILE));

        let mut settings = Self::figment(&config_path).extract::<Settings>().map_err(Box::new)?;
        if settings.workspace_root.is_none() {
            settings.workspace_root = Self::workspace_root();
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a specific file, still honouring `RAG_` variables
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = Self::figment(path.as_ref())
            .extract::<Settings>()
            .map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nesting levels; single underscores stay in field names
            .merge(
                Env::prefixed("RAG_")
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
    }

    /// Check values that would otherwise surface as failures deep inside a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate().map_err(ConfigError::Invalid)?;

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be at least 1".to_string()));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        if self.documents.patterns.is_empty() {
            return Err(ConfigError::Invalid(
                "documents.patterns must contain at least one pattern".to_string(),
            ));
        }
        Ok(())
    }

    /// Find the settings file by looking for a .ragcore directory
    /// from the current directory up to the filesystem root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(SETTINGS_FILE))
    }

    /// Get the workspace root directory (where .ragcore is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Snapshot location, with relative paths anchored at the workspace root when known.
    pub fn resolved_index_path(&self) -> PathBuf {
        match &self.workspace_root {
            Some(root) if self.index_path.is_relative() => root.join(&self.index_path),
            _ => self.index_path.clone(),
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `root/.ragcore`
    pub fn init_config_file(root: &Path, force: bool) -> Result<PathBuf, ConfigError> {
        let config_path = root.join(CONFIG_DIR).join(SETTINGS_FILE);

        if !force && config_path.exists() {
            return Err(ConfigError::AlreadyExists(config_path));
        }

        let settings = Settings {
            workspace_root: Some(root.to_path_buf()),
            ..Settings::default()
        };
        settings.save(&config_path)?;

        Ok(config_path)
    }
}
