//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Compute the cosine similarity between two embeddings.
///
/// Zero-magnitude input scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product(a, b)?;
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (magnitude_a * magnitude_b))
}

/// A similarity search result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Insertion position of the matched vector.
    pub position: usize,

    /// Raw inner-product score.
    pub score: f32,
}

impl SimilarityResult {
    /// Create a new similarity result.
    pub fn new(position: usize, score: f32) -> Self {
        Self { position, score }
    }
}

/// Find the top-k candidates by inner product with `query`.
///
/// Results are ordered by descending score; equal scores keep ascending
/// insertion order. At most `min(k, candidates.len())` results are returned.
///
/// Scores are assumed finite; a NaN would sort above every real score.
/// [`crate::FlatIndex`] rejects non-finite vectors before they get here.
pub fn top_k_inner_product(
    query: &[f32],
    candidates: &[Embedding],
    k: usize,
) -> Result<Vec<SimilarityResult>> {
    let mut scores: Vec<(usize, f32)> = Vec::with_capacity(candidates.len());

    for (position, embedding) in candidates.iter().enumerate() {
        scores.push((position, dot_product(query, embedding)?));
    }

    // Stable sort, position is part of the key so ties never depend on it
    scores.sort_by_key(|&(position, score)| (Reverse(OrderedFloat(score)), position));
    scores.truncate(k);

    Ok(scores
        .into_iter()
        .map(|(position, score)| SimilarityResult::new(position, score))
        .collect())
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut Embedding) {
    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}
