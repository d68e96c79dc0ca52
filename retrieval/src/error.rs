//! Error types for pattern retrieval.

use mentor_embeddings::EmbeddingError;
use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur while building or querying the pattern index.
///
/// An empty result set is never an error: querying an index with nothing in
/// it succeeds with zero matches.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The embedding backend failed or was unreachable.
    #[error("embedding provider error: {0}")]
    Provider(EmbeddingError),

    /// A batch of vectors disagrees with the established index width.
    #[error("dimension mismatch: index has {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A catalog record is unusable.
    #[error("invalid pattern at position {index}: {reason}")]
    InvalidPattern { index: usize, reason: String },

    /// Query arguments are out of range.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Catalog could not be located or parsed.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EmbeddingError> for RetrievalError {
    fn from(err: EmbeddingError) -> Self {
        if err.is_provider_failure() {
            return Self::Provider(err);
        }
        match err {
            EmbeddingError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            other => Self::Provider(other),
        }
    }
}

impl RetrievalError {
    /// Whether the failure came from the embedding backend.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_gets_its_own_variant() {
        let err: RetrievalError = EmbeddingError::DimensionMismatch {
            expected: 8,
            actual: 5,
        }
        .into();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 8,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_non_finite_vectors_are_provider_errors() {
        let err: RetrievalError =
            EmbeddingError::InvalidResponse("non-finite value".to_string()).into();
        assert!(err.is_provider_error());
    }

    #[test]
    fn test_backend_errors_become_provider_errors() {
        let err: RetrievalError = EmbeddingError::ApiRequest("down".to_string()).into();
        assert!(err.is_provider_error());
        assert_eq!(
            err.to_string(),
            "embedding provider error: API request failed: down"
        );
    }
}
