//! Loading the static pattern catalog.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, RetrievalError};
use crate::record::PatternRecord;

/// The set of known patterns the index is seeded from.
///
/// On disk the catalog is a JSON array of objects, each with at least
/// `description` and `code` strings.
#[derive(Debug, Clone, Default)]
pub struct PatternCatalog {
    patterns: Vec<PatternRecord>,
    source: Option<PathBuf>,
}

impl PatternCatalog {
    /// Build a catalog from records, validating each one.
    pub fn new(patterns: Vec<PatternRecord>) -> Result<Self> {
        for (index, pattern) in patterns.iter().enumerate() {
            pattern
                .validate()
                .map_err(|reason| RetrievalError::InvalidPattern { index, reason })?;
        }

        Ok(Self {
            patterns,
            source: None,
        })
    }

    /// Parse a catalog from a JSON array.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let patterns: Vec<PatternRecord> = serde_json::from_str(json)?;
        debug!("Parsed {} catalog entries", patterns.len());
        Self::new(patterns)
    }

    /// Read and parse a catalog file.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            RetrievalError::Catalog(format!("failed to read {}: {e}", path.display()))
        })?;

        let mut catalog = Self::from_json_str(&content)?;
        catalog.source = Some(path.to_path_buf());

        info!(
            "Loaded {} patterns from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Where the catalog was read from, if it came from a file.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The catalog records in order.
    pub fn patterns(&self) -> &[PatternRecord] {
        &self.patterns
    }

    /// Take the records out of the catalog.
    pub fn into_patterns(self) -> Vec<PatternRecord> {
        self.patterns
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the catalog has no records.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
