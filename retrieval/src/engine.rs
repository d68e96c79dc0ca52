//! Pattern search engine: provider wiring, catalog startup and queries.

use std::path::PathBuf;
use std::sync::Arc;

use mentor_embeddings::{
    CachedProvider, EmbeddingCache, EmbeddingError, EmbeddingProvider, HashProvider,
    OpenAIProvider,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::PatternCatalog;
use crate::config::{EmbeddingConfig, EmbeddingProviderType, RetrievalConfig};
use crate::error::{Result, RetrievalError};
use crate::index::SimilarityIndex;
use crate::record::SimilarPattern;

/// Explicitly owned similarity search engine.
///
/// Construction wires up the embedding provider; [`PatternSearch::warm_up`]
/// is the separate startup step that loads and indexes the catalog. The
/// engine is meant to be created once and shared (for example behind an
/// `Arc`) with whatever needs similarity search.
pub struct PatternSearch {
    /// Configuration.
    config: RetrievalConfig,

    /// Pattern index.
    index: Arc<SimilarityIndex>,
}

impl PatternSearch {
    /// Create a new engine builder.
    pub fn builder() -> PatternSearchBuilder {
        PatternSearchBuilder::new()
    }

    /// Create an engine, building the provider described by `config`.
    pub async fn new(config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        let provider = build_provider(&config.embedding).await?;
        Ok(Self::with_provider(config, provider))
    }

    /// Create an engine around an existing provider.
    pub fn with_provider(config: RetrievalConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        info!(
            "Initializing pattern search with {}/{}",
            provider.name(),
            provider.model()
        );
        Self {
            config,
            index: Arc::new(SimilarityIndex::new(provider)),
        }
    }

    /// Load the configured catalog into the index.
    ///
    /// Returns the number of indexed patterns; zero when no catalog is
    /// configured. Any failure leaves the index as it was, so a caller may
    /// log it and keep serving (empty) results.
    pub async fn warm_up(&self) -> Result<usize> {
        let Some(path) = &self.config.catalog_path else {
            info!("No pattern catalog configured; similarity index starts empty");
            return Ok(0);
        };

        let catalog = match PatternCatalog::from_json_file(path).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Pattern catalog unavailable: {e}");
                return Err(e);
            }
        };

        self.load_catalog(catalog).await
    }

    /// Replace the indexed catalog.
    pub async fn load_catalog(&self, catalog: PatternCatalog) -> Result<usize> {
        let source = catalog
            .source()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string());

        let count = self.index.rebuild(catalog.into_patterns()).await?;
        info!("Pattern catalog ready: {count} patterns from {source}");
        Ok(count)
    }

    /// Find up to `k` catalog patterns similar to `code`.
    ///
    /// Applies the configured `min_score` filter after ranking, if any.
    pub async fn find_similar(&self, code: &str, k: usize) -> Result<Vec<SimilarPattern>> {
        let mut results = self.index.find_similar(code, k).await?;

        if let Some(min_score) = self.config.query.min_score {
            let before = results.len();
            results.retain(|r| r.score >= min_score);
            debug!(
                "min_score {min_score} kept {} of {before} matches",
                results.len()
            );
        }

        Ok(results)
    }

    /// Find similar patterns using the configured default `k`.
    pub async fn find_similar_default(&self, code: &str) -> Result<Vec<SimilarPattern>> {
        self.find_similar(code, self.config.query.default_k).await
    }

    /// The underlying index.
    pub fn index(&self) -> Arc<SimilarityIndex> {
        Arc::clone(&self.index)
    }

    /// The engine configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Get engine statistics.
    pub async fn stats(&self) -> IndexStats {
        let snapshot = self.index.snapshot().await;
        let provider = self.index.provider();

        IndexStats {
            patterns: snapshot.records,
            vectors: snapshot.vectors,
            dimension: snapshot.dimension,
            provider: provider.name().to_string(),
            model: provider.model().to_string(),
            catalog_path: self.config.catalog_path.clone(),
        }
    }
}

/// Build the embedding provider described by `config`.
///
/// HTTP providers are wrapped in a [`CachedProvider`] when caching is on.
pub async fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderType::Hash => {
            let mut provider = HashProvider::new();
            if let Some(dimensions) = config.dimensions {
                provider = provider.with_dimension(dimensions);
            }
            debug!("Using hash provider with {} dimensions", provider.dimension());
            Ok(Arc::new(provider))
        }
        EmbeddingProviderType::OpenAI => {
            let api_key = config.api_key().ok_or_else(|| {
                warn!("{} is not set", config.api_key_env);
                RetrievalError::Provider(EmbeddingError::ProviderNotConfigured)
            })?;

            let mut provider = OpenAIProvider::new().with_api_key(api_key);
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            if let Some(dimensions) = config.dimensions {
                provider = provider.with_dimensions(dimensions);
            }

            if !config.cache_enabled {
                return Ok(Arc::new(provider));
            }

            let cache = match &config.cache_path {
                Some(path) => {
                    EmbeddingCache::with_persistence(path, config.cache_max_entries).await?
                }
                None => EmbeddingCache::new(config.cache_max_entries),
            };
            Ok(Arc::new(CachedProvider::new(provider, cache)))
        }
    }
}

/// Builder for [`PatternSearch`].
pub struct PatternSearchBuilder {
    config: RetrievalConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl PatternSearchBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
            provider: None,
        }
    }

    /// Start from an existing configuration.
    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the catalog file.
    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.catalog_path = Some(path.into());
        self
    }

    /// Use this provider instead of building one from the configuration.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the default number of matches.
    pub fn with_default_k(mut self, k: usize) -> Self {
        self.config.query.default_k = k;
        self
    }

    /// Build the engine. The catalog is not loaded until `warm_up`.
    pub async fn build(self) -> Result<PatternSearch> {
        match self.provider {
            Some(provider) => {
                self.config.validate()?;
                Ok(PatternSearch::with_provider(self.config, provider))
            }
            None => PatternSearch::new(self.config).await,
        }
    }
}

impl Default for PatternSearchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the pattern search engine.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    /// Number of indexed patterns.
    pub patterns: usize,

    /// Number of stored vectors.
    pub vectors: usize,

    /// Vector width, once established.
    pub dimension: Option<usize>,

    /// Provider name.
    pub provider: String,

    /// Provider model.
    pub model: String,

    /// Configured catalog file.
    pub catalog_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::record::PatternRecord;
    use pretty_assertions::assert_eq;

    fn hash_config() -> RetrievalConfig {
        RetrievalConfig::default().with_embedding(EmbeddingConfig::hash(48))
    }

    #[tokio::test]
    async fn test_engine_creation() {
        let engine = PatternSearch::new(hash_config()).await.unwrap();
        let stats = engine.stats().await;

        assert_eq!(stats.patterns, 0);
        assert_eq!(stats.provider, "hash");
        assert_eq!(stats.dimension, None);
    }

    #[tokio::test]
    async fn test_warm_up_without_catalog() {
        let engine = PatternSearch::new(hash_config()).await.unwrap();
        assert_eq!(engine.warm_up().await.unwrap(), 0);
        assert!(engine.find_similar_default("x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_openai_without_key_fails_at_startup() {
        let mut config = RetrievalConfig::default();
        config.embedding.api_key_env = "MENTOR_TEST_KEY_THAT_IS_NEVER_SET".to_string();

        let err = PatternSearch::new(config).await.err().unwrap();
        assert!(err.is_provider_error());
    }

    #[tokio::test]
    async fn test_min_score_filters_after_ranking() {
        let config = hash_config().with_query(QueryConfig {
            default_k: 5,
            min_score: Some(0.99),
        });
        let engine = PatternSearch::new(config).await.unwrap();

        let exact = PatternRecord::new("Two pointers", "l, r = 0, len(a) - 1");
        let catalog = PatternCatalog::new(vec![
            exact.clone(),
            PatternRecord::new("Topological sort", "indegree = defaultdict(int)"),
        ])
        .unwrap();
        engine.load_catalog(catalog).await.unwrap();

        let results = engine.find_similar_default(&exact.join_text()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record, exact);
    }

    #[tokio::test]
    async fn test_builder_with_provider() {
        let engine = PatternSearch::builder()
            .with_provider(Arc::new(HashProvider::new().with_dimension(16)))
            .with_default_k(2)
            .build()
            .await
            .unwrap();

        assert_eq!(engine.config().query.default_k, 2);
        assert_eq!(engine.index().provider().name(), "hash");
    }

    #[tokio::test]
    async fn test_builder_rejects_zero_k() {
        let result = PatternSearch::builder()
            .with_provider(Arc::new(HashProvider::new()))
            .with_default_k(0)
            .build()
            .await;
        assert!(matches!(result, Err(RetrievalError::Config(_))));
    }
}
