//! Configuration management for tutoria
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Chat completion backend configuration
    #[serde(default)]
    pub chat_model: ChatModelConfig,

    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Topic statistics configuration
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Chat completion backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatModelConfig {
    /// Base URL of the OpenAI-compatible chat backend
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,

    /// Model identifier for assistant replies
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Environment variable name holding the API key
    #[serde(default = "default_chat_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature for assistant replies
    #[serde(default = "default_chat_temperature")]
    pub temperature: f32,

    /// Sampling temperature for topic classification
    #[serde(default = "default_classifier_temperature")]
    pub classifier_temperature: f32,

    /// Number of prior turns replayed into each completion
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for ChatModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            model: default_chat_model(),
            api_key_env: default_chat_api_key_env(),
            temperature: default_chat_temperature(),
            classifier_temperature: default_classifier_temperature(),
            history_limit: default_history_limit(),
        }
    }
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the OpenAI-compatible embedding backend
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable name holding the API key
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,

    /// Batch size for embedding requests
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Maximum feature dimension of the lexical fallback vectorizer
    #[serde(default = "default_lexical_max_features")]
    pub lexical_max_features: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            api_key_env: default_embedding_api_key_env(),
            batch_size: default_embedding_batch_size(),
            lexical_max_features: default_lexical_max_features(),
        }
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap characters between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum chunks injected into the assistant context
    #[serde(default = "default_max_context_chunks")]
    pub max_context_chunks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_context_chunks: default_max_context_chunks(),
        }
    }
}

/// Topic statistics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Fixed weight each active student contributes to aggregate percentages
    #[serde(default = "default_student_weight")]
    pub student_weight: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            student_weight: default_student_weight(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            chat_model: ChatModelConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunk: ChunkConfig::default(),
            retrieval: RetrievalConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read config {:?}: {}", path, e)))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the given path, or defaults if it does not exist
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);
        if path.exists() {
            Self::load(&path)
        } else {
            debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chunk.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".to_string()));
        }
        if self.chunk.chunk_overlap >= self.chunk.chunk_size {
            return Err(Error::Config(
                "chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding batch_size must be greater than 0".to_string()));
        }
        if self.stats.student_weight <= 0.0 {
            return Err(Error::Config("student_weight must be positive".to_string()));
        }
        Ok(())
    }
}
