//! Configuration for the pattern search engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Configuration for the pattern search engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Catalog file to index at startup. `None` starts with an empty index.
    pub catalog_path: Option<PathBuf>,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Query configuration.
    pub query: QueryConfig,
}

impl RetrievalConfig {
    /// Create a configuration that indexes the given catalog.
    pub fn new(catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            catalog_path: Some(catalog_path.into()),
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file.
    pub async fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Set the catalog path.
    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the query configuration.
    pub fn with_query(mut self, config: QueryConfig) -> Self {
        self.query = config;
        self
    }

    /// Reject values no engine can run with.
    pub fn validate(&self) -> Result<()> {
        if self.query.default_k == 0 {
            return Err(RetrievalError::Config(
                "query.default_k must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimensions == Some(0) {
            return Err(RetrievalError::Config(
                "embedding.dimensions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default location of the catalog in the user's data directory.
pub fn default_catalog_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_default()
        .join("mentor/patterns/algorithm_patterns.json")
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings (provider default when unset).
    pub model: Option<String>,

    /// API base URL for HTTP providers.
    pub base_url: Option<String>,

    /// Requested vector width. For the hash provider this is the width used.
    pub dimensions: Option<usize>,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Whether to cache embeddings.
    pub cache_enabled: bool,

    /// Maximum cache size.
    pub cache_max_entries: usize,

    /// File to persist the cache in.
    pub cache_path: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::OpenAI,
            model: None,
            base_url: None,
            dimensions: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            cache_enabled: true,
            cache_max_entries: 10000,
            cache_path: None,
        }
    }
}

impl EmbeddingConfig {
    /// Offline hashing provider with the given width.
    pub fn hash(dimensions: usize) -> Self {
        Self {
            provider: EmbeddingProviderType::Hash,
            dimensions: Some(dimensions),
            ..Self::default()
        }
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
    /// Offline feature hashing.
    Hash,
}

/// Configuration for query processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Number of matches returned when the caller does not pick one.
    pub default_k: usize,

    /// Drop matches scoring below this after ranking.
    pub min_score: Option<f32>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_k: 3,
            min_score: None,
        }
    }
}
