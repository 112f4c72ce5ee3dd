//! Embedding service abstraction
//!
//! Provides a unified interface for embedding providers:
//! - Amazon Bedrock (Titan text embeddings)
//! - OpenAI-compatible `/embeddings` endpoints
//! - Deterministic mock for tests and offline runs
//!
//! Every provider makes a single attempt per call. Retry policy, if any,
//! belongs to the caller.

use crate::config::{AwsConfig, EmbeddingConfig};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Provider payload limit, in characters
pub const MAX_INPUT_CHARS: usize = 8000;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Cut `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_input(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}

/// Amazon Bedrock embedder (Titan text embeddings)
pub struct BedrockEmbedder {
    client: BedrockClient,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanRequest<'a> {
    input_text: &'a str,
}

#[derive(Deserialize)]
struct TitanResponse {
    embedding: Vec<f32>,
}

impl BedrockEmbedder {
    /// Create with existing Bedrock client
    pub fn with_client(client: BedrockClient, model: String, dimension: usize) -> Self {
        Self { client, model, dimension }
    }

    /// Create a client for the configured region
    pub async fn new(aws: &AwsConfig, model: String, dimension: usize) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_types::region::Region::new(aws.region.clone()))
            .load()
            .await;

        Self::with_client(BedrockClient::new(&sdk_config), model, dimension)
    }
}

#[async_trait]
impl Embedder for BedrockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let payload = serde_json::to_vec(&TitanRequest { input_text: text })?;

        let output = self.client
            .invoke_model()
            .model_id(&self.model)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(payload))
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Bedrock invoke_model failed: {}", e),
            })?;

        let result: TitanResponse = serde_json::from_slice(output.body().as_ref())
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Failed to parse response: {}", e),
            })?;

        if result.embedding.is_empty() {
            return Err(AppError::EmbeddingError {
                message: "Response contained an empty embedding".to_string(),
            });
        }

        Ok(result.embedding)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// OpenAI embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: Vec<&'a str>,
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder
    pub fn new(
        api_key: String,
        model: String,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let dimension = match model.as_str() {
            "text-embedding-ada-002" => 1536,
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            _ => 768,
        };

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model,
            dimension,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = OpenAIRequest {
            input: vec![text],
            model: &self.model,
        };

        let response = self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: OpenAIResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingError {
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        result
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::EmbeddingError {
                message: "Response contained no embedding".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Mock embedder for testing and offline runs.
///
/// Hashes each lowercase word into one of `dimension` buckets, so texts that
/// share words get similar vectors and identical texts get identical ones.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    fn bucket(&self, word: &str) -> usize {
        let hash = word
            .bytes()
            .fold(2_166_136_261_u32, |acc, b| (acc ^ u32::from(b)).wrapping_mul(16_777_619));
        hash as usize % self.dimension
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            vector[self.bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub async fn create_embedder(
    embedding: &EmbeddingConfig,
    aws: &AwsConfig,
) -> Result<Arc<dyn Embedder>> {
    let timeout = Duration::from_secs(embedding.timeout_secs);

    match embedding.provider.as_str() {
        "bedrock" => Ok(Arc::new(
            BedrockEmbedder::new(aws, embedding.model.clone(), embedding.dimension).await,
        )),
        "openai" => {
            let key = embedding.api_key.clone().ok_or_else(|| AppError::Validation {
                message: "OpenAI API key required".to_string(),
                field: Some("embedding.api_key".to_string()),
            })?;
            Ok(Arc::new(OpenAIEmbedder::new(
                key,
                embedding.model.clone(),
                embedding.api_base.clone(),
                timeout,
            )?))
        }
        "mock" => Ok(Arc::new(MockEmbedder::new(embedding.dimension))),
        other => {
            tracing::warn!(provider = other, "Unknown embedding provider, using mock");
            Ok(Arc::new(MockEmbedder::new(embedding.dimension)))
        }
    }
}
