//! Configuration loading and validation
//!
//! Configuration lives in a TOML file (`~/.config/docrag/config.toml` by
//! default) with environment-variable fallbacks for endpoints and API keys.
//! Every field has a default so a missing file still yields a usable config
//! pointed at local services.

mod defaults;

use crate::error::{Error, Result};
use defaults::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub crawl: CrawlConfig,

    #[serde(default)]
    pub chunk: ChunkConfig,
}

/// Vector index (Qdrant) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Qdrant gRPC URL
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Collection name
    #[serde(default = "default_index_name")]
    pub name: String,

    /// Default namespace for operations that do not specify one
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Character budget for chunk content stored in point payloads
    #[serde(default = "default_metadata_content_limit")]
    pub metadata_content_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            name: default_index_name(),
            namespace: default_namespace(),
            metadata_content_limit: default_metadata_content_limit(),
        }
    }
}

/// Embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings API
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected output dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Chunks per provider request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between batches in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            api_key_env: None,
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the API key from the configured env var, falling back to
    /// `OPENAI_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
        std::env::var(var).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible chat completions API
    #[serde(default = "default_completion_url")]
    pub url: String,

    /// Model identifier
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_completion_temperature")]
    pub temperature: f32,

    #[serde(default = "default_completion_max_tokens")]
    pub max_tokens: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: default_completion_url(),
            model: default_completion_model(),
            api_key_env: None,
            temperature: default_completion_temperature(),
            max_tokens: default_completion_max_tokens(),
        }
    }
}

impl CompletionConfig {
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
        std::env::var(var).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Crawler defaults applied when a request omits a field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    #[serde(default = "default_crawl_max_depth")]
    pub max_depth: u32,

    #[serde(default = "default_crawl_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_crawl_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_crawl_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_crawl_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_crawl_user_agent")]
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: default_crawl_max_depth(),
            max_pages: default_crawl_max_pages(),
            delay_ms: default_crawl_delay_ms(),
            max_concurrent: default_crawl_max_concurrent(),
            timeout_secs: default_crawl_timeout_secs(),
            user_agent: default_crawl_user_agent(),
        }
    }
}

/// Chunking defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Window size in whitespace tokens
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive windows in tokens
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

impl Config {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docrag")
            .join("config.toml")
    }

    /// Load configuration from the given path, or the default location.
    /// A missing file yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
