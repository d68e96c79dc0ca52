//! # Embeddings
//!
//! Embedding generation and exact vector search for the code-pattern
//! similarity engine.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text batches to dense vectors
//! - **Exact Search**: Flat inner-product top-k with deterministic tie-breaks
//! - **Multiple Providers**: OpenAI-compatible HTTP, offline feature hashing
//! - **Caching**: Skip repeat provider calls for texts already embedded
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► FlatIndex                 │
//! │       │                                  │                      │
//! │       ▼                                  ▼                      │
//! │  OpenAI/Hash/Cached               top_k_inner_product          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod index;
pub mod provider;
pub mod similarity;

pub use cache::{CachedProvider, EmbeddingCache};
pub use error::{EmbeddingError, Result};
pub use index::FlatIndex;
pub use provider::{EmbeddingProvider, HashProvider, OpenAIProvider};
pub use similarity::{SimilarityResult, cosine_similarity, dot_product};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
