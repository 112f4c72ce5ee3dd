//! Vector similarity search over chunk embeddings
//!
//! The query is embedded by the configured provider (input cut to the
//! provider's character limit, one attempt, bounded by a timeout) and compared
//! to every embedded chunk by cosine similarity. Provider failures are returned
//! to the caller instead of being folded into an empty result.

use super::ranker::rank;
use super::{
    score_chunks, RetrievalMode, RetrievalResult, Retriever, Scorer, SearchRequest,
    DEFAULT_SIMILARITY_THRESHOLD,
};
use docrag_common::embeddings::{truncate_input, Embedder, MAX_INPUT_CHARS};
use docrag_common::errors::{AppError, Result};
use docrag_common::index::{Chunk, IndexProvider};
use docrag_common::metrics::{EmbeddingMetrics, RetrievalMetrics};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cosine similarity in [-1, 1]; 0 when either vector has zero norm.
///
/// Vectors of different length are compared over their common prefix.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Scores embedded chunks against one query embedding
pub struct VectorScorer {
    query: Vec<f32>,
}

impl VectorScorer {
    pub fn new(query: Vec<f32>) -> Self {
        Self { query }
    }
}

impl Scorer for VectorScorer {
    fn score(&self, chunk: &Chunk) -> Option<f32> {
        chunk
            .embedding()
            .map(|embedding| cosine_similarity(&self.query, embedding))
    }
}

/// Vector retriever over the embeddings index
pub struct VectorRetriever {
    index: Arc<IndexProvider>,
    embedder: Arc<dyn Embedder>,
    timeout: Duration,
    max_input_chars: usize,
}

impl VectorRetriever {
    /// Create a new vector retriever
    pub fn new(index: Arc<IndexProvider>, embedder: Arc<dyn Embedder>, timeout: Duration) -> Self {
        Self {
            index,
            embedder,
            timeout,
            max_input_chars: MAX_INPUT_CHARS,
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Embed `text` with the provider, bounded by the timeout
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let input = truncate_input(text, self.max_input_chars);
        let metrics = EmbeddingMetrics::start(self.embedder.model_name());

        let outcome = match tokio::time::timeout(self.timeout, self.embedder.embed(input)).await {
            Ok(Ok(embedding)) if embedding.is_empty() => Err(AppError::EmbeddingError {
                message: "Provider returned an empty embedding".to_string(),
            }),
            Ok(result) => result,
            Err(_) => Err(AppError::EmbeddingTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(embedding) => {
                metrics.success();
                Ok(embedding)
            }
            Err(e) => {
                warn!(model = self.embedder.model_name(), error = %e, "Embedding request failed");
                metrics.failure(e.code().label());
                Err(e)
            }
        }
    }

    /// Chunks with similarity >= `threshold`, best first, at most `top_k`.
    ///
    /// A missing index (or one without embeddings) returns an empty result
    /// before the provider is called.
    pub async fn search(&self, query: &str, top_k: usize, threshold: f32) -> Result<RetrievalResult> {
        let metrics = RetrievalMetrics::start(RetrievalMode::Vector.as_str());

        let Some(index) = self.index.load().await else {
            metrics.no_index();
            return Ok(RetrievalResult::empty(RetrievalMode::Vector));
        };

        let Some(dimension) = index.dimension() else {
            debug!("Index has no embedded chunks");
            metrics.success(0);
            return Ok(RetrievalResult::empty(RetrievalMode::Vector));
        };

        let query_embedding = match self.generate_embedding(query).await {
            Ok(embedding) if embedding.len() == dimension => embedding,
            Ok(embedding) => {
                metrics.failure();
                return Err(AppError::EmbeddingError {
                    message: format!(
                        "Query embedding has {} dimensions, index has {}",
                        embedding.len(),
                        dimension
                    ),
                });
            }
            Err(e) => {
                metrics.failure();
                return Err(e);
            }
        };

        let scorer = VectorScorer::new(query_embedding);
        let candidates = score_chunks(&index, &scorer);
        let candidate_count = candidates.len();
        let hits = rank(candidates, top_k, threshold);

        debug!(
            candidates = candidate_count,
            returned = hits.len(),
            top_k,
            threshold,
            "Vector retrieval complete"
        );
        metrics.success(hits.len());

        Ok(RetrievalResult::new(RetrievalMode::Vector, hits))
    }
}

#[async_trait::async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, request: &SearchRequest) -> Result<RetrievalResult> {
        let threshold = request.min_score.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
        self.search(&request.query, request.limit, threshold).await
    }

    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::test_support::{chunk, embedded};
    use async_trait::async_trait;
    use docrag_common::index::{Index, StaticIndexSource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a fixed vector and remembers what it was asked to embed
    struct FixedEmbedder {
        vector: Vec<f32>,
        calls: AtomicUsize,
        last_input: Mutex<String>,
    }

    impl FixedEmbedder {
        fn new(vector: Vec<f32>) -> Self {
            Self {
                vector,
                calls: AtomicUsize::new(0),
                last_input: Mutex::new(String::new()),
            }
        }
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_input.lock().unwrap() = text.to_string();
            Ok(self.vector.clone())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }

        fn dimension(&self) -> usize {
            self.vector.len()
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::EmbeddingError {
                message: "response missing `embedding`".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![1.0, 0.0])
        }

        fn model_name(&self) -> &str {
            "slow"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn provider(chunks: Vec<Chunk>) -> Arc<IndexProvider> {
        Arc::new(IndexProvider::preloaded("semantic", Index::new(chunks)))
    }

    fn retriever(index: Arc<IndexProvider>, embedder: Arc<dyn Embedder>) -> VectorRetriever {
        VectorRetriever::new(index, embedder, Duration::from_secs(5))
    }

    #[test]
    fn test_cosine_identical_is_one() {
        let v = [0.3, -1.2, 4.5, 0.01];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_is_bounded_and_symmetric() {
        let a = [0.9, 0.1, -0.4];
        let b = [0.2, 0.8, 0.5];
        let s = cosine_similarity(&a, &b);
        assert!((-1.0..=1.0).contains(&s));
        assert_eq!(s, cosine_similarity(&b, &a));
    }

    #[test]
    fn test_scorer_skips_chunks_without_embedding() {
        let scorer = VectorScorer::new(vec![1.0, 0.0]);
        assert!(scorer.score(&chunk("plain", "Plain", "text", &[])).is_none());
        assert_eq!(scorer.score(&embedded("e", "E", vec![1.0, 0.0])), Some(1.0));
    }

    #[tokio::test]
    async fn test_threshold_keeps_only_similar_chunks() {
        // similarities: 0.7 and 0.3 against the unit query [1, 0]
        let high = vec![0.7, (1.0_f32 - 0.49).sqrt()];
        let low = vec![0.3, (1.0_f32 - 0.09).sqrt()];
        let index = provider(vec![
            embedded("low", "Low", low),
            embedded("high", "High", high),
            chunk("plain", "Plain", "no vector", &[]),
        ]);
        let r = retriever(index, Arc::new(FixedEmbedder::new(vec![1.0, 0.0])));

        for top_k in [1, 5] {
            let result = r.search("query", top_k, 0.5).await.unwrap();
            assert_eq!(result.len(), 1);
            assert_eq!(result.hits()[0].chunk.id, "high");
            assert!((result.hits()[0].score - 0.7).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_query_is_truncated_before_embedding() {
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0, 0.0]));
        let index = provider(vec![embedded("a", "A", vec![1.0, 0.0])]);
        let r = retriever(index, embedder.clone());

        let long_query = "x".repeat(MAX_INPUT_CHARS + 100);
        r.search(&long_query, 5, 0.0).await.unwrap();
        assert_eq!(embedder.last_input.lock().unwrap().len(), MAX_INPUT_CHARS);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let index = provider(vec![embedded("a", "A", vec![1.0, 0.0])]);
        let r = retriever(index, Arc::new(FailingEmbedder));

        let err = r.search("query", 5, 0.5).await.unwrap_err();
        assert!(err.is_retrieval_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_timeout_is_failure() {
        let index = provider(vec![embedded("a", "A", vec![1.0, 0.0])]);
        let r = VectorRetriever::new(index, Arc::new(SlowEmbedder), Duration::from_millis(200));

        let err = r.search("query", 5, 0.5).await.unwrap_err();
        assert!(matches!(err, AppError::EmbeddingTimeout { timeout_ms: 200 }));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_failure() {
        let index = provider(vec![embedded("a", "A", vec![1.0, 0.0, 0.0])]);
        let r = retriever(index, Arc::new(FixedEmbedder::new(vec![1.0, 0.0])));

        let err = r.search("query", 5, 0.5).await.unwrap_err();
        assert!(matches!(err, AppError::EmbeddingError { .. }));
    }

    #[tokio::test]
    async fn test_missing_index_skips_provider() {
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0, 0.0]));
        let absent = Arc::new(IndexProvider::new(
            "semantic",
            vec![Box::new(StaticIndexSource::empty("nothing"))],
        ));
        let r = retriever(absent, embedder.clone());

        let result = r.retrieve(&SearchRequest::new("query", 5)).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_index_without_embeddings_skips_provider() {
        let embedder = Arc::new(FixedEmbedder::new(vec![1.0, 0.0]));
        let index = provider(vec![chunk("plain", "Plain", "text", &[])]);
        let r = retriever(index, embedder.clone());

        assert!(r.search("query", 5, 0.5).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }
}
