//! Pattern records and search hits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key holding the list of use cases for a pattern.
pub const USE_CASES_KEY: &str = "use_cases";

/// One known solution in the pattern catalog.
///
/// `description` and `code` are required; any other field in the catalog
/// entry is kept verbatim in `metadata` and serialized back out flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    /// What the pattern is and when it applies.
    pub description: String,

    /// Example implementation.
    pub code: String,

    /// Everything else from the catalog entry.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl PatternRecord {
    /// Create a record with no metadata.
    pub fn new(description: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            code: code.into(),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach the `use_cases` list.
    pub fn with_use_cases<I, S>(self, use_cases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<Value> = use_cases
            .into_iter()
            .map(|s| Value::String(s.into()))
            .collect();
        self.with_metadata(USE_CASES_KEY, Value::Array(list))
    }

    /// The text that gets embedded for this record.
    ///
    /// Exactly `description`, one space, `code`. No trimming.
    pub fn join_text(&self) -> String {
        let mut text = String::with_capacity(self.description.len() + 1 + self.code.len());
        text.push_str(&self.description);
        text.push(' ');
        text.push_str(&self.code);
        text
    }

    /// String-valued metadata field.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// The `use_cases` list, skipping non-string items. Empty if absent.
    pub fn use_cases(&self) -> Vec<&str> {
        self.metadata
            .get(USE_CASES_KEY)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Check the required fields, describing the first problem found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.description.is_empty() {
            return Err("description is empty".to_string());
        }
        if self.code.is_empty() {
            return Err("code is empty".to_string());
        }
        Ok(())
    }
}

/// A catalog record matched by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarPattern {
    /// The matched record.
    pub record: PatternRecord,

    /// Raw inner product between the query and the record embeddings.
    pub score: f32,

    /// Insertion position of the record in the index.
    pub position: usize,
}
