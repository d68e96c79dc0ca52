//! Embedding cache for avoiding repeated provider calls.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;

/// Cache entry for an embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hash of the model and text that were embedded.
    pub key: String,

    /// The embedding vector.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// When the entry was created (unix millis).
    pub created_at: i64,
}

/// Bounded cache of embeddings keyed by model and text.
pub struct EmbeddingCache {
    /// In-memory cache.
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,

    /// Path for persistent cache storage.
    cache_path: Option<PathBuf>,

    /// Maximum cache size.
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_path: None,
            max_entries,
        }
    }

    /// Create a cache backed by a JSON file, loading it if it exists.
    pub async fn with_persistence(path: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let cache = Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_path: Some(path.clone()),
            max_entries,
        };

        if fs::try_exists(&path).await? {
            cache.load().await?;
        }

        Ok(cache)
    }

    /// Compute the lookup key for a text under a model.
    fn hash_key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::hash_key(text, model);
        let cache = self.cache.read().await;
        cache.get(&key).map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) -> Result<()> {
        self.put_many(model, vec![(text.to_string(), embedding)])
            .await
    }

    /// Put several embeddings in the cache, persisting at most once.
    pub async fn put_many(&self, model: &str, items: Vec<(String, Embedding)>) -> Result<()> {
        if items.is_empty() || self.max_entries == 0 {
            return Ok(());
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let mut cache = self.cache.write().await;

        for (text, embedding) in items {
            let key = Self::hash_key(&text, model);

            // Evict the oldest entry when a new key would overflow
            if !cache.contains_key(&key) && cache.len() >= self.max_entries {
                let oldest = cache
                    .iter()
                    .min_by_key(|(_, v)| v.created_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest_key) = oldest {
                    cache.remove(&oldest_key);
                }
            }

            cache.insert(
                key.clone(),
                CacheEntry {
                    key,
                    embedding,
                    model: model.to_string(),
                    created_at,
                },
            );
        }
        debug!("Cached embeddings (model: {model}, {} entries)", cache.len());

        if self.cache_path.is_some() {
            drop(cache); // Release lock before I/O
            self.save().await?;
        }

        Ok(())
    }

    /// Check if an embedding is cached.
    pub async fn contains(&self, text: &str, model: &str) -> bool {
        let key = Self::hash_key(text, model);
        self.cache.read().await.contains_key(&key)
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
        info!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        let mut models: Vec<String> = cache
            .values()
            .map(|e| e.model.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        models.sort();

        CacheStats {
            entries: cache.len(),
            max_entries: self.max_entries,
            models,
        }
    }

    /// Save cache to disk.
    async fn save(&self) -> Result<()> {
        if let Some(ref path) = self.cache_path {
            let cache = self.cache.read().await;
            let entries: Vec<&CacheEntry> = cache.values().collect();
            let content = serde_json::to_string(&entries)?;

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }

            fs::write(path, content).await?;
            debug!("Saved {} cache entries to disk", entries.len());
        }
        Ok(())
    }

    /// Load cache from disk.
    async fn load(&self) -> Result<()> {
        if let Some(ref path) = self.cache_path {
            let content = fs::read_to_string(path).await?;
            let mut entries: Vec<CacheEntry> = serde_json::from_str(&content)?;

            if entries.len() > self.max_entries {
                // Keep the newest entries when the file outgrew the bound
                entries.sort_by_key(|e| std::cmp::Reverse(e.created_at));
                entries.truncate(self.max_entries);
            }

            let mut cache = self.cache.write().await;
            for entry in entries {
                cache.insert(entry.key.clone(), entry);
            }

            info!("Loaded {} cache entries from disk", cache.len());
        }
        Ok(())
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Models with cached embeddings.
    pub models: Vec<String>,
}

/// A provider wrapper that serves repeated texts from an [`EmbeddingCache`].
///
/// Misses in a batch are forwarded to the inner provider together in one
/// call, so the batching behaviour of the inner provider is preserved.
/// Entries are keyed by model and requested width, so reusing a persisted
/// cache after changing `dimensions` never mixes vector widths.
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Name the cache entries are stored under: the model, plus the
    /// requested width when the inner provider pins one.
    fn cache_model(&self) -> String {
        match self.provider.dimensions() {
            Some(dimensions) => format!("{}@{dimensions}", self.provider.model()),
            None => self.provider.model().to_string(),
        }
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        self.provider.model()
    }

    fn dimensions(&self) -> Option<usize> {
        self.provider.dimensions()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let cache_model = self.cache_model();
        let model = cache_model.as_str();

        let mut slots: Vec<Option<Embedding>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<String> = Vec::new();
        let mut miss_slots: Vec<usize> = Vec::new();

        for (position, text) in texts.iter().enumerate() {
            match self.cache.get(text, model).await {
                Some(embedding) => slots.push(Some(embedding)),
                None => {
                    slots.push(None);
                    misses.push(text.clone());
                    miss_slots.push(position);
                }
            }
        }

        debug!(
            "Embedding cache: {} hits, {} misses",
            texts.len() - misses.len(),
            misses.len()
        );

        if !misses.is_empty() {
            let fresh = self.provider.embed(&misses).await?;
            if fresh.len() != misses.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    misses.len(),
                    fresh.len()
                )));
            }

            for (&position, embedding) in miss_slots.iter().zip(fresh.iter()) {
                slots[position] = Some(embedding.clone());
            }
            // The vectors are good even if the cache file cannot be written
            if let Err(e) = self
                .cache
                .put_many(model, misses.into_iter().zip(fresh).collect())
                .await
            {
                warn!("Failed to persist embedding cache: {e}");
            }
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| EmbeddingError::Cache("unfilled embedding slot".to_string()))
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OpenAIProvider;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path as path_matcher};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Provider that records every batch it receives.
    struct RecordingProvider {
        calls: AtomicUsize,
        batches: std::sync::Mutex<Vec<Vec<String>>>,
    }

    impl RecordingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                batches: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "len-model"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(texts.to_vec());
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_cache_put_get() {
        let cache = EmbeddingCache::new(100);
        let embedding = vec![1.0, 2.0, 3.0];

        cache
            .put("hello", "model-1", embedding.clone())
            .await
            .unwrap();

        assert_eq!(cache.get("hello", "model-1").await, Some(embedding));
        assert!(cache.get("hello", "model-2").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_eviction() {
        let cache = EmbeddingCache::new(2);

        cache.put("a", "model", vec![1.0]).await.unwrap();
        cache.put("b", "model", vec![2.0]).await.unwrap();
        cache.put("c", "model", vec![3.0]).await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.models, vec!["model".to_string()]);
        assert!(cache.contains("c", "model").await);
    }

    #[tokio::test]
    async fn test_cache_persists_to_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/cache.json");

        let cache = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
        cache.put("snippet", "m", vec![0.25, 0.75]).await.unwrap();

        let reloaded = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
        assert_eq!(reloaded.get("snippet", "m").await, Some(vec![0.25, 0.75]));
    }

    #[tokio::test]
    async fn test_cached_provider_forwards_misses_in_one_batch() {
        let provider = Arc::new(RecordingProvider::new());
        let cached = CachedProvider::new(provider.clone(), EmbeddingCache::new(100));

        let first = vec!["aa".to_string(), "b".to_string()];
        cached.embed(&first).await.unwrap();

        let second = vec!["b".to_string(), "cccc".to_string(), "aa".to_string()];
        let embeddings = cached.embed(&second).await.unwrap();

        assert_eq!(
            embeddings,
            vec![vec![1.0, 1.0], vec![4.0, 1.0], vec![2.0, 1.0]]
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            provider.batches.lock().unwrap().last().cloned(),
            Some(vec!["cccc".to_string()])
        );
    }

    #[tokio::test]
    async fn test_load_keeps_newest_entries_within_bound() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let entries: Vec<CacheEntry> = ["old", "mid", "new"]
            .iter()
            .enumerate()
            .map(|(i, text)| CacheEntry {
                key: EmbeddingCache::hash_key(text, "m"),
                embedding: vec![i as f32],
                model: "m".to_string(),
                created_at: i as i64,
            })
            .collect();
        std::fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();

        let cache = EmbeddingCache::with_persistence(&path, 2).await.unwrap();
        assert_eq!(cache.stats().await.entries, 2);
        assert!(!cache.contains("old", "m").await);
        assert!(cache.contains("mid", "m").await);
        assert!(cache.contains("new", "m").await);
    }

    #[tokio::test]
    async fn test_persisted_cache_is_partitioned_by_width() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        // Written by an earlier run at the model's native width
        let earlier = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
        earlier
            .put("a", "text-embedding-3-small", vec![0.1, 0.2, 0.3, 0.4])
            .await
            .unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_matcher("/embeddings"))
            .and(body_partial_json(serde_json::json!({
                "input": ["a", "b"],
                "dimensions": 2,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "embedding": [1.0, 0.0], "index": 0 },
                    { "embedding": [0.0, 1.0], "index": 1 },
                ],
                "model": "text-embedding-3-small",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new()
            .with_api_key("k")
            .with_base_url(server.uri())
            .with_dimensions(2);
        let cache = EmbeddingCache::with_persistence(&path, 10).await.unwrap();
        let cached = CachedProvider::new(provider, cache);

        let batch = vec!["a".to_string(), "b".to_string()];
        let embeddings = cached.embed(&batch).await.unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

        // Served from the cache now, still at the requested width
        let again = cached.embed_one("a").await.unwrap();
        assert_eq!(again, vec![1.0, 0.0]);
        assert_eq!(cached.dimensions(), Some(2));
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_vectors() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        // The parent of the cache file is a regular file, so every save fails
        let cache = EmbeddingCache {
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_path: Some(blocker.join("cache.json")),
            max_entries: 10,
        };
        let provider = Arc::new(RecordingProvider::new());
        let cached = CachedProvider::new(provider.clone(), cache);

        let embeddings = cached.embed(&["abc".to_string()]).await.unwrap();
        assert_eq!(embeddings, vec![vec![3.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_cached_provider_full_hit_skips_provider() {
        let provider = Arc::new(RecordingProvider::new());
        let cached = CachedProvider::new(provider.clone(), EmbeddingCache::new(100));

        let batch = vec!["x".to_string()];
        cached.embed(&batch).await.unwrap();
        cached.embed(&batch).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.name(), "recording");
    }
}
