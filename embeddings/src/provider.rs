//! Embedding providers.
//!
//! A provider turns a batch of texts into one vector per text, in input order.
//! Two implementations ship here: an OpenAI-compatible HTTP provider and an
//! offline feature-hashing provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;

/// Trait for embedding providers.
///
/// Implementations must be deterministic for identical input and return
/// vectors of a single width for the lifetime of the instance. Failures are
/// reported as errors; a provider never substitutes placeholder vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the model this provider embeds with.
    fn model(&self) -> &str;

    /// Output width this instance asks its backend for, if it pins one.
    ///
    /// `None` means the model's native width.
    fn dimensions(&self) -> Option<usize> {
        None
    }

    /// Generate embeddings for a batch of texts with a single backend call.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Generate the embedding for one text.
    async fn embed_one(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.embed(&[text.to_string()]).await?;
        if embeddings.len() != 1 {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected 1 embedding, got {}",
                embeddings.len()
            )));
        }
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".to_string()))
    }

    /// Check if the provider is available (API key set, etc.).
    fn is_available(&self) -> bool;
}

#[async_trait]
impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    fn dimensions(&self) -> Option<usize> {
        (**self).dimensions()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        (**self).embed(texts).await
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Default model for [`OpenAIProvider`].
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

/// Default API base for [`OpenAIProvider`].
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Longest single input accepted by [`OpenAIProvider`], in characters.
const MAX_INPUT_CHARS: usize = 32_000;

/// OpenAI-compatible embedding provider.
///
/// Works against any server exposing the `/embeddings` endpoint shape.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model to request.
    model: String,

    /// Output dimensions (if supported by the model).
    dimensions: Option<usize>,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider, reading the key from `OPENAI_API_KEY`.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            dimensions: None,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request a specific output width.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        if let Some(text) = texts.iter().find(|t| t.chars().count() > MAX_INPUT_CHARS) {
            return Err(EmbeddingError::TextTooLong {
                length: text.chars().count(),
                max_length: MAX_INPUT_CHARS,
            });
        }

        debug!(
            "Generating batch embeddings for {} texts with model: {}",
            texts.len(),
            self.model
        );

        let mut body = serde_json::json!({
            "input": texts,
            "model": self.model,
        });

        if let Some(dims) = self.dimensions {
            body["dimensions"] = serde_json::json!(dims);
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "API error ({status}): {error_text}"
            )));
        }

        let mut result: OpenAIEmbeddingResponse = response.json().await?;

        if result.data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        // The API tags each item with its input position; do not trust array order.
        result.data.sort_by_key(|item| item.index);
        if let Some((position, item)) = result
            .data
            .iter()
            .enumerate()
            .find(|(position, item)| item.index != *position)
        {
            return Err(EmbeddingError::InvalidResponse(format!(
                "embedding index {} found at position {position}",
                item.index
            )));
        }

        if let Some(usage) = &result.usage {
            debug!(
                "Embedding request used {} prompt tokens ({} total)",
                usage.prompt_tokens, usage.total_tokens
            );
        }

        let embeddings: Vec<Embedding> = result.data.into_iter().map(|d| d.embedding).collect();
        info!(
            "Generated {} batch embeddings with model {}",
            embeddings.len(),
            result.model
        );

        Ok(embeddings)
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    model: String,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    total_tokens: u64,
}

/// Default width of [`HashProvider`] vectors.
pub const DEFAULT_HASH_DIMENSION: usize = 384;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Weight of a whole-token feature.
const TOKEN_WEIGHT: f32 = 1.0;

/// Weight of a character trigram feature.
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Offline embedding provider based on FNV-1a feature hashing.
///
/// Each identifier-like token and each character trigram inside it is hashed
/// into one of `dimension` buckets; the resulting vector is L2-normalized.
/// Fully deterministic with no model download, which makes it suitable for
/// tests, demos and offline runs. Quality is lexical, not semantic.
pub struct HashProvider {
    dimension: usize,
}

impl HashProvider {
    /// Create a provider with the default width.
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }

    /// Set the output width. Zero is bumped to one.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.max(1);
        self
    }

    /// Get the output width.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed one text without going through the async trait.
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0f32; self.dimension];

        let tokens: Vec<String> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        if tokens.is_empty() {
            // Punctuation-only or blank input still gets a stable, non-zero vector.
            self.add_feature(&mut embedding, text.as_bytes(), TOKEN_WEIGHT);
        }

        for token in &tokens {
            self.add_feature(&mut embedding, token.as_bytes(), TOKEN_WEIGHT);

            let chars: Vec<char> = token.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut embedding, trigram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        normalize(&mut embedding);
        embedding
    }

    fn add_feature(&self, embedding: &mut Embedding, bytes: &[u8], weight: f32) {
        let bucket = (fnv1a(bytes) % self.dimension as u64) as usize;
        embedding[bucket] += weight;
    }
}

impl Default for HashProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn name(&self) -> &str {
        "hash"
    }

    fn model(&self) -> &str {
        "fnv1a-features"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimension)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        debug!("Hashing {} texts into {} dimensions", texts.len(), self.dimension);
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn is_available(&self) -> bool {
        true
    }
}
