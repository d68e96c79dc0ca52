//! # Retrieval Engine
//!
//! Similarity search over a catalog of known code patterns. A submitted
//! snippet is embedded and compared by inner product against every catalog
//! entry (`description + " " + code`), and the best matches are returned with
//! their raw scores.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Pattern Search                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │   Pattern    │  │  Similarity  │  │  Embedding   │          │
//! │  │   Catalog    │─►│    Index     │◄─│   Provider   │          │
//! │  └──────────────┘  └──────────────┘  └──────────────┘          │
//! │                          │                                      │
//! │                          ▼                                      │
//! │                  ┌──────────────┐                               │
//! │                  │ SimilarPattern│                              │
//! │                  │  (record,    │                               │
//! │                  │   score)     │                               │
//! │                  └──────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mentor_retrieval::PatternSearch;
//!
//! let engine = PatternSearch::builder()
//!     .with_catalog_path("data/patterns/algorithm_patterns.json")
//!     .build()
//!     .await?;
//! engine.warm_up().await?;
//!
//! for hit in engine.find_similar(snippet, 3).await? {
//!     println!("{:.3} {}", hit.score, hit.record.description);
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod record;

pub use catalog::PatternCatalog;
pub use config::{EmbeddingConfig, EmbeddingProviderType, QueryConfig, RetrievalConfig};
pub use engine::{IndexStats, PatternSearch, PatternSearchBuilder, build_provider};
pub use error::{Result, RetrievalError};
pub use index::{IndexSnapshot, SimilarityIndex};
pub use record::{PatternRecord, SimilarPattern};

// Re-export from dependencies for convenience
pub use mentor_embeddings::{EmbeddingError, EmbeddingProvider};
