//! Flat index for exact inner-product search.

use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::{SimilarityResult, top_k_inner_product};

/// An exact (brute force) inner-product index.
///
/// Vectors are addressed by insertion position. The dimension is fixed by the
/// first batch that is added and stays fixed until [`FlatIndex::clear`].
/// Stored vectors are kept exactly as given; nothing is normalized.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    /// Stored vectors, in insertion order.
    vectors: Vec<Embedding>,

    /// Established dimension, `None` until the first batch lands.
    dimension: Option<usize>,
}

impl FlatIndex {
    /// Create an empty index with no established dimension.
    pub fn new() -> Self {
        Self::default()
    }

    /// The established dimension, if any vector has been added.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Get the number of vectors in the index.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Get a vector by insertion position.
    pub fn get(&self, position: usize) -> Option<&Embedding> {
        self.vectors.get(position)
    }

    /// Check that a batch can be appended without changing anything.
    ///
    /// Returns the width shared by every vector in the batch. An empty batch
    /// is accepted and reports the current dimension (or zero).
    pub fn validate_batch(&self, batch: &[Embedding]) -> Result<usize> {
        let Some(first) = batch.first() else {
            return Ok(self.dimension.unwrap_or(0));
        };

        let width = first.len();
        if width == 0 {
            return Err(EmbeddingError::InvalidResponse(
                "provider returned an empty embedding".to_string(),
            ));
        }

        match self.dimension {
            Some(expected) if expected != width => {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: width,
                });
            }
            _ => {}
        }

        if let Some(bad) = batch.iter().find(|v| v.len() != width) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: width,
                actual: bad.len(),
            });
        }

        if let Some(position) = batch.iter().position(|v| !is_finite(v)) {
            return Err(EmbeddingError::InvalidResponse(format!(
                "embedding {position} contains a non-finite value"
            )));
        }

        Ok(width)
    }

    /// Append a batch of vectors.
    ///
    /// The whole batch is validated first, so on error the index is unchanged.
    pub fn add_batch(&mut self, batch: Vec<Embedding>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let width = self.validate_batch(&batch)?;
        if self.dimension.is_none() {
            info!("Allocated flat inner-product index with dimension {width}");
            self.dimension = Some(width);
        }

        let count = batch.len();
        self.vectors.extend(batch);
        debug!("Added {count} vectors to flat index ({} total)", self.len());

        Ok(())
    }

    /// Search for the `k` vectors with the highest inner product.
    ///
    /// An empty index yields no results regardless of the query width.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SimilarityResult>> {
        let Some(expected) = self.dimension else {
            return Ok(Vec::new());
        };

        if query.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }

        if !is_finite(query) {
            return Err(EmbeddingError::InvalidResponse(
                "query embedding contains a non-finite value".to_string(),
            ));
        }

        top_k_inner_product(query, &self.vectors, k)
    }

    /// Remove every vector and forget the established dimension.
    pub fn clear(&mut self) {
        self.vectors.clear();
        self.dimension = None;
        info!("Cleared flat index");
    }
}

fn is_finite(embedding: &[f32]) -> bool {
    embedding.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_batch_sets_dimension() {
        let mut index = FlatIndex::new();
        assert_eq!(index.dimension(), None);

        index
            .add_batch(vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]])
            .unwrap();

        assert_eq!(index.dimension(), Some(3));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_index_search() {
        let mut index = FlatIndex::new();
        index
            .add_batch(vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.7, 0.7, 0.0],
            ])
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].position, 0);
        assert_eq!(results[1].position, 2);
    }

    #[test]
    fn test_dimension_mismatch_leaves_index_untouched() {
        let mut index = FlatIndex::new();
        index.add_batch(vec![vec![1.0, 0.0, 0.0]]).unwrap();

        let result = index.add_batch(vec![vec![1.0, 0.0]]);
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(index.len(), 1);
        assert_eq!(index.dimension(), Some(3));
    }

    #[test]
    fn test_ragged_batch_is_rejected() {
        let mut index = FlatIndex::new();
        let result = index.add_batch(vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]);

        assert!(result.is_err());
        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);
    }

    #[test]
    fn test_zero_width_batch_is_rejected() {
        let index = FlatIndex::new();
        assert!(matches!(
            index.validate_batch(&[Vec::new()]),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let mut index = FlatIndex::new();
        index.add_batch(vec![vec![1.0, 0.0]]).unwrap();

        let result = index.add_batch(vec![vec![0.5, 0.5], vec![f32::NAN, 0.0]]);
        assert!(matches!(result, Err(EmbeddingError::InvalidResponse(_))));
        assert_eq!(index.len(), 1);

        assert!(matches!(
            index.search(&[f32::INFINITY, 0.0], 1),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_empty_index_search_returns_nothing() {
        let index = FlatIndex::new();
        let results = index.search(&[1.0, 2.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_query_width_must_match() {
        let mut index = FlatIndex::new();
        index.add_batch(vec![vec![1.0, 0.0]]).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_clear_resets_dimension() {
        let mut index = FlatIndex::new();
        index.add_batch(vec![vec![1.0, 0.0]]).unwrap();
        index.clear();

        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);

        index.add_batch(vec![vec![1.0, 0.0, 0.0, 0.0]]).unwrap();
        assert_eq!(index.dimension(), Some(4));
        assert_eq!(index.get(0), Some(&vec![1.0, 0.0, 0.0, 0.0]));
    }
}
