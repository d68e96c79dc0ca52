//! Similarity index over catalog patterns.

use std::sync::Arc;

use mentor_embeddings::{EmbeddingError, EmbeddingProvider, FlatIndex};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{Result, RetrievalError};
use crate::record::{PatternRecord, SimilarPattern};

/// Vectors and the records they were embedded from, position-aligned.
#[derive(Default)]
struct IndexState {
    vectors: FlatIndex,
    records: Vec<PatternRecord>,
}

/// Point-in-time counts for an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSnapshot {
    /// Number of records held.
    pub records: usize,

    /// Number of vectors held.
    pub vectors: usize,

    /// Established vector width.
    pub dimension: Option<usize>,
}

/// Exact inner-product index of catalog patterns.
///
/// Writers are serialized and a batch is published in one step, so readers
/// see either the state before a write or the state after it, never a
/// partially applied batch. Queries take a shared lock and run concurrently.
/// Dropping an `add_patterns` future before it completes leaves the index as
/// it was.
pub struct SimilarityIndex {
    provider: Arc<dyn EmbeddingProvider>,
    state: RwLock<IndexState>,
    write_gate: Mutex<()>,
}

impl SimilarityIndex {
    /// Create an empty index that embeds with `provider`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            state: RwLock::new(IndexState::default()),
            write_gate: Mutex::new(()),
        }
    }

    /// The embedding provider in use.
    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Embed `patterns` in one provider call and append them.
    ///
    /// Returns how many patterns were added. An empty batch is a no-op and
    /// does not reach the provider. On any error nothing is added.
    pub async fn add_patterns(&self, patterns: Vec<PatternRecord>) -> Result<usize> {
        if patterns.is_empty() {
            return Ok(0);
        }
        validate(&patterns)?;

        let _writer = self.write_gate.lock().await;
        let embeddings = self.embed_batch(&patterns).await?;

        let mut state = self.state.write().await;
        state.vectors.add_batch(embeddings)?;
        let added = patterns.len();
        state.records.extend(patterns);

        info!(
            "Indexed {added} patterns ({} total, dimension {:?})",
            state.records.len(),
            state.vectors.dimension()
        );
        Ok(added)
    }

    /// Replace the whole catalog.
    ///
    /// The new patterns are embedded first; the old contents stay visible
    /// until the swap, and survive untouched if embedding fails. The vector
    /// width is re-established from the new batch.
    pub async fn rebuild(&self, patterns: Vec<PatternRecord>) -> Result<usize> {
        validate(&patterns)?;

        let _writer = self.write_gate.lock().await;

        let mut fresh = IndexState::default();
        if !patterns.is_empty() {
            let embeddings = self.embed_batch(&patterns).await?;
            fresh.vectors.add_batch(embeddings)?;
            fresh.records = patterns;
        }

        let count = fresh.records.len();
        *self.state.write().await = fresh;

        info!("Rebuilt similarity index with {count} patterns");
        Ok(count)
    }

    /// Find the `k` patterns whose embeddings have the highest inner product
    /// with the embedding of `query`.
    ///
    /// Results are ordered by descending score, ties by insertion order. An
    /// empty index returns no results without calling the provider.
    pub async fn find_similar(&self, query: &str, k: usize) -> Result<Vec<SimilarPattern>> {
        if k == 0 {
            return Err(RetrievalError::InvalidQuery(
                "k must be at least 1".to_string(),
            ));
        }

        if self.state.read().await.records.is_empty() {
            debug!("Similarity query against empty index");
            return Ok(Vec::new());
        }

        let query_embedding = self.provider.embed_one(query).await?;

        let state = self.state.read().await;
        let hits = state.vectors.search(&query_embedding, k)?;

        let results: Vec<SimilarPattern> = hits
            .into_iter()
            .filter_map(|hit| {
                state.records.get(hit.position).map(|record| SimilarPattern {
                    record: record.clone(),
                    score: hit.score,
                    position: hit.position,
                })
            })
            .collect();

        debug!(
            "Similarity query returned {} of {} patterns (k = {k})",
            results.len(),
            state.records.len()
        );
        Ok(results)
    }

    /// Number of indexed patterns.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Whether nothing has been indexed.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }

    /// Established vector width, if any.
    pub async fn dimension(&self) -> Option<usize> {
        self.state.read().await.vectors.dimension()
    }

    /// Copy of the indexed records in insertion order.
    pub async fn records(&self) -> Vec<PatternRecord> {
        self.state.read().await.records.clone()
    }

    /// Record and vector counts taken under one lock.
    pub async fn snapshot(&self) -> IndexSnapshot {
        let state = self.state.read().await;
        IndexSnapshot {
            records: state.records.len(),
            vectors: state.vectors.len(),
            dimension: state.vectors.dimension(),
        }
    }

    /// Drop every pattern and forget the vector width.
    pub async fn clear(&self) {
        let _writer = self.write_gate.lock().await;
        let mut state = self.state.write().await;
        state.vectors.clear();
        state.records.clear();
        info!("Cleared similarity index");
    }

    async fn embed_batch(&self, patterns: &[PatternRecord]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = patterns.iter().map(PatternRecord::join_text).collect();
        debug!(
            "Embedding {} patterns with {}/{}",
            texts.len(),
            self.provider.name(),
            self.provider.model()
        );

        let embeddings = self
            .provider
            .embed(&texts)
            .await
            .map_err(RetrievalError::Provider)?;

        if embeddings.len() != texts.len() {
            return Err(RetrievalError::Provider(EmbeddingError::InvalidResponse(
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    embeddings.len()
                ),
            )));
        }

        Ok(embeddings)
    }
}

fn validate(patterns: &[PatternRecord]) -> Result<()> {
    for (index, pattern) in patterns.iter().enumerate() {
        pattern
            .validate()
            .map_err(|reason| RetrievalError::InvalidPattern { index, reason })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_embeddings::HashProvider;
    use pretty_assertions::assert_eq;

    fn hash_index() -> SimilarityIndex {
        SimilarityIndex::new(Arc::new(HashProvider::new().with_dimension(32)))
    }

    #[tokio::test]
    async fn test_new_index_is_empty() {
        let index = hash_index();
        assert!(index.is_empty().await);
        assert_eq!(index.dimension().await, None);
        assert_eq!(index.provider().name(), "hash");
    }

    #[tokio::test]
    async fn test_k_zero_is_rejected() {
        let index = hash_index();
        let err = index.find_similar("x", 0).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_rejected_before_embedding() {
        let index = hash_index();
        let err = index
            .add_patterns(vec![PatternRecord::new("ok", "x"), PatternRecord::new("", "y")])
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::InvalidPattern { index: 1, .. }));
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_exact_duplicate_is_its_own_best_match() {
        let index = hash_index();
        let pattern = PatternRecord::new("Binary search", "while lo <= hi: mid = (lo + hi) // 2");
        index
            .add_patterns(vec![
                PatternRecord::new("Graph BFS", "queue = deque([root])"),
                pattern.clone(),
            ])
            .await
            .unwrap();

        let results = index.find_similar(&pattern.join_text(), 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record, pattern);
        assert_eq!(results[0].position, 1);
    }

    #[tokio::test]
    async fn test_clear_then_reuse() {
        let index = hash_index();
        index
            .add_patterns(vec![PatternRecord::new("a", "b")])
            .await
            .unwrap();
        index.clear().await;

        assert_eq!(
            index.snapshot().await,
            IndexSnapshot {
                records: 0,
                vectors: 0,
                dimension: None
            }
        );
        assert!(index.find_similar("a b", 3).await.unwrap().is_empty());
    }
}
