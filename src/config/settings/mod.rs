
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::embeddings::chunking::{ChunkingConfig, MAX_CHUNK_SIZE, MAX_OVERLAP_PERCENT, MIN_CHUNK_SIZE};
use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;
use crate::feedback::FeedbackConfig;
use crate::rag::RetrievalConfig;
use crate::router::RouterConfig;

pub const CONFIG_DIR_ENV: &str = "DOCS_RAG_HOME";
const CONFIG_DIR_NAME: &str = ".docs-rag";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
    pub embedding_dimension: u32,
    pub retry_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            generation_model: "llama3.2:latest".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// LanceDB connection URI. Defaults to `<config dir>/vectors`.
    pub uri: Option<String>,
    pub collection_name: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            collection_name: "knowledge_base".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid collection name: {0:?} (cannot be empty)")]
    InvalidCollectionName(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration rooted at `base_dir`.
    #[inline]
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Resolve the configuration directory from `DOCS_RAG_HOME` or the home directory.
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR_NAME))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when absent.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            toml::from_str::<Self>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Self::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;
        config.sanitize();

        Ok(config)
    }

    /// Load the file and apply `RAG_*` environment overrides on top.
    #[inline]
    pub fn load_effective<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let mut config = Self::load(config_dir)?;
        config.apply_env_overrides_with(|key| std::env::var(key).ok());
        config.sanitize();
        config
            .validate()
            .with_context(|| "Configuration validation failed after environment overrides")?;
        Ok(config)
    }

    /// Apply overrides looked up through `lookup` (normally the process environment).
    #[inline]
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "RAG_CHUNK_SIZE", &mut self.chunking.chunk_size);
        override_parsed(&lookup, "RAG_CHUNK_OVERLAP", &mut self.chunking.overlap_percent);
        override_parsed(&lookup, "RAG_RETRIEVAL_COUNT", &mut self.retrieval.retrieval_count);
        override_parsed(
            &lookup,
            "RAG_SIMILARITY_THRESHOLD",
            &mut self.retrieval.similarity_threshold,
        );
        override_parsed(
            &lookup,
            "RAG_MAX_HISTORY",
            &mut self.retrieval.max_conversation_history,
        );
        override_parsed(
            &lookup,
            "RAG_GENERATION_TIMEOUT_SECS",
            &mut self.retrieval.generation_timeout_secs,
        );
        override_parsed(&lookup, "RAG_OLLAMA_PORT", &mut self.ollama.port);

        if let Some(host) = lookup("RAG_OLLAMA_HOST") {
            self.ollama.host = host;
        }
        if let Some(model) = lookup("RAG_EMBEDDING_MODEL") {
            self.ollama.embedding_model = model;
        }
        if let Some(model) = lookup("RAG_GENERATION_MODEL") {
            self.ollama.generation_model = model;
        }
        if let Some(uri) = lookup("RAG_VECTOR_STORE_URI") {
            self.vector_store.uri = Some(uri);
        }
        if let Some(name) = lookup("RAG_COLLECTION_NAME") {
            self.vector_store.collection_name = name;
        }
    }

    /// Replace out-of-range tuning values with their defaults, warning for each.
    #[inline]
    pub fn sanitize(&mut self) {
        let chunking = ChunkingConfig::default();
        let retrieval = RetrievalConfig::default();
        let router = RouterConfig::default();

        clamp_to_default(
            "chunk size",
            &mut self.chunking.chunk_size,
            MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE,
            chunking.chunk_size,
        );
        clamp_to_default(
            "chunk overlap percent",
            &mut self.chunking.overlap_percent,
            0..=MAX_OVERLAP_PERCENT,
            chunking.overlap_percent,
        );
        clamp_to_default(
            "retrieval count",
            &mut self.retrieval.retrieval_count,
            1..=10,
            retrieval.retrieval_count,
        );
        clamp_to_default(
            "similarity threshold",
            &mut self.retrieval.similarity_threshold,
            0.0..=1.0,
            retrieval.similarity_threshold,
        );
        clamp_to_default(
            "max conversation history",
            &mut self.retrieval.max_conversation_history,
            1..=50,
            retrieval.max_conversation_history,
        );
        clamp_to_default(
            "generation timeout",
            &mut self.retrieval.generation_timeout_secs,
            1..=120,
            retrieval.generation_timeout_secs,
        );
        clamp_to_default(
            "response cache capacity",
            &mut self.retrieval.cache_capacity,
            1..=10_000,
            retrieval.cache_capacity,
        );
        clamp_to_default(
            "small talk score cutoff",
            &mut self.retrieval.small_talk_max_score,
            0.0..=1.0,
            retrieval.small_talk_max_score,
        );
        clamp_to_default(
            "off-topic confidence gate",
            &mut self.router.off_topic_min_confidence,
            0.0..=1.0,
            router.off_topic_min_confidence,
        );
        clamp_to_default(
            "max message length",
            &mut self.router.max_message_length,
            1..=100_000,
            router.max_message_length,
        );
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        if self.vector_store.collection_name.trim().is_empty() {
            return Err(ConfigError::InvalidCollectionName(
                self.vector_store.collection_name.clone(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Get the path for the SQLite feedback database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join("feedback.db")
    }

    /// LanceDB connection URI, defaulting to a directory under the base dir
    #[inline]
    pub fn vector_store_uri(&self) -> String {
        self.vector_store.uri.clone().unwrap_or_else(|| {
            self.get_base_dir()
                .join("vectors")
                .to_string_lossy()
                .into_owned()
        })
    }
}

fn override_parsed<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return;
    };

    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(e) => warn!("Ignoring {}={:?}: {}", key, raw, e),
    }
}

fn clamp_to_default<T>(name: &str, value: &mut T, range: std::ops::RangeInclusive<T>, default: T)
where
    T: PartialOrd + Copy + std::fmt::Debug,
{
    if !range.contains(&*value) {
        warn!(
            "{} {:?} is outside {:?}, using default {:?}",
            name, value, range, default
        );
        *value = default;
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.ollama_url()?;

        for model in [&self.embedding_model, &self.generation_model] {
            if model.trim().is_empty() {
                return Err(ConfigError::InvalidModel(model.clone()));
            }
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    #[inline]
    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    #[inline]
    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let candidate = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        candidate.ollama_url()?;
        self.host = host;
        Ok(())
    }

    #[inline]
    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    #[inline]
    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    #[inline]
    pub fn set_generation_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.generation_model = model;
        Ok(())
    }

    #[inline]
    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}
