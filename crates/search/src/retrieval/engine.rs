//! Retrieval engine - the outward-facing entry points
//!
//! Owns one retriever per mode and decides what happens when semantic
//! retrieval cannot run: with `fallback_to_lexical` set, an embedding-provider
//! failure is logged and answered with lexical results.

use super::lexical::LexicalRetriever;
use super::vector::VectorRetriever;
use super::{RetrievalMode, RetrievalResult};
use crate::context::{assemble, AssembledContext, RagContext};
use docrag_common::config::{AppConfig, RetrievalConfig, RetrievalStrategy};
use docrag_common::embeddings::{create_embedder, Embedder};
use docrag_common::errors::Result;
use docrag_common::index::IndexProvider;
use docrag_common::metrics::record_lexical_fallback;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct RetrievalEngine {
    lexical: LexicalRetriever,
    vector: VectorRetriever,
    config: RetrievalConfig,
    system_prompt: String,
}

impl RetrievalEngine {
    /// Assemble from already-built parts
    pub fn new(
        lexical_index: Arc<IndexProvider>,
        semantic_index: Arc<IndexProvider>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
        embedding_timeout: Duration,
    ) -> Self {
        Self {
            lexical: LexicalRetriever::new(lexical_index),
            vector: VectorRetriever::new(semantic_index, embedder, embedding_timeout),
            config,
            system_prompt: docrag_common::config::DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.vector = self.vector.with_max_input_chars(max_input_chars);
        self
    }

    /// Build index providers and the embedder from configuration.
    /// Nothing is fetched until the first retrieval.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let lexical_index =
            Arc::new(IndexProvider::from_config("lexical", &config.index.lexical, &config.aws).await);
        let semantic_index =
            Arc::new(IndexProvider::from_config("semantic", &config.index.semantic, &config.aws).await);
        let embedder = create_embedder(&config.embedding, &config.aws).await?;

        info!(
            mode = ?config.retrieval.mode,
            top_k = config.retrieval.top_k,
            threshold = config.retrieval.similarity_threshold,
            embedding_model = embedder.model_name(),
            "Retrieval engine configured"
        );

        Ok(Self::new(
            lexical_index,
            semantic_index,
            embedder,
            config.retrieval.clone(),
            config.embedding_timeout(),
        )
        .with_max_input_chars(config.embedding.max_input_chars)
        .with_system_prompt(config.prompt.system_prompt.clone()))
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Keyword retrieval; never fails
    pub async fn retrieve_lexical(&self, query: &str, top_k: usize) -> RetrievalResult {
        self.lexical.search(query, top_k).await
    }

    /// Embedding retrieval; fails when the embedding provider does
    pub async fn retrieve_semantic(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<RetrievalResult> {
        self.vector.search(query, top_k, threshold).await
    }

    /// Render a result for the prompt
    pub fn build_context(&self, result: &RetrievalResult) -> AssembledContext {
        assemble(result)
    }

    /// Retrieve with the configured mode, top-K and threshold
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        self.retrieve_with(query, self.config.mode).await
    }

    /// Retrieve with an explicit strategy and the configured limits
    pub async fn retrieve_with(
        &self,
        query: &str,
        strategy: RetrievalStrategy,
    ) -> Result<RetrievalResult> {
        if !self.config.enabled {
            return Ok(RetrievalResult::empty(match strategy {
                RetrievalStrategy::Lexical => RetrievalMode::Lexical,
                RetrievalStrategy::Semantic => RetrievalMode::Vector,
            }));
        }

        let top_k = self.config.top_k;

        match strategy {
            RetrievalStrategy::Lexical => Ok(self.retrieve_lexical(query, top_k).await),
            RetrievalStrategy::Semantic => {
                match self
                    .retrieve_semantic(query, top_k, self.config.similarity_threshold)
                    .await
                {
                    Ok(result) => Ok(result),
                    Err(e) if e.is_retrieval_failure() && self.config.fallback_to_lexical => {
                        warn!(error = %e, "Semantic retrieval failed, falling back to lexical");
                        record_lexical_fallback();
                        Ok(self.retrieve_lexical(query, top_k).await)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Retrieve, assemble, and compose the system prompt in one step
    pub async fn prepare(&self, query: &str, strategy: RetrievalStrategy) -> Result<RagContext> {
        let result = self.retrieve_with(query, strategy).await?;
        Ok(RagContext::new(&self.system_prompt, self.build_context(&result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::test_support::{chunk, embedded};
    use async_trait::async_trait;
    use docrag_common::embeddings::MockEmbedder;
    use docrag_common::errors::AppError;
    use docrag_common::index::{Index, StaticIndexSource};

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::EmbeddingError {
                message: "connection refused".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "down"
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn lexical_index() -> Arc<IndexProvider> {
        Arc::new(IndexProvider::preloaded(
            "lexical",
            Index::new(vec![
                chunk("deploy", "Deploy Guide", "Steps to deploy the site.", &["deploy"]),
                chunk("billing", "Billing", "Invoices and payment plans.", &["billing"]),
            ]),
        ))
    }

    fn absent_index(name: &str) -> Arc<IndexProvider> {
        Arc::new(IndexProvider::new(name, vec![Box::new(StaticIndexSource::empty(name))]))
    }

    fn engine(
        lexical: Arc<IndexProvider>,
        semantic: Arc<IndexProvider>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> RetrievalEngine {
        RetrievalEngine::new(lexical, semantic, embedder, config, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_absent_indexes_return_empty_without_provider() {
        let e = engine(
            absent_index("lexical"),
            absent_index("semantic"),
            Arc::new(DownEmbedder),
            RetrievalConfig::default(),
        );

        assert!(e.retrieve_lexical("deploy", 5).await.is_empty());
        // the down embedder would fail if it were reached
        assert!(e.retrieve_semantic("deploy", 5, 0.5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_semantic_with_mock_embedder() {
        let mock = MockEmbedder::new(16);
        let deploy = mock.embed("deploy the site").await.unwrap();
        let billing = mock.embed("billing invoices").await.unwrap();
        let semantic = Arc::new(IndexProvider::preloaded(
            "semantic",
            Index::new(vec![
                embedded("deploy", "Deploy Guide", deploy),
                embedded("billing", "Billing", billing),
            ]),
        ));

        let e = engine(lexical_index(), semantic, Arc::new(mock), RetrievalConfig::default());
        let result = e.retrieve_semantic("deploy the site", 5, 0.5).await.unwrap();
        assert_eq!(result.mode(), RetrievalMode::Vector);
        assert_eq!(result.hits()[0].chunk.id, "deploy");
        assert!((result.hits()[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_semantic_failure_falls_back_to_lexical() {
        let semantic = Arc::new(IndexProvider::preloaded(
            "semantic",
            Index::new(vec![embedded("deploy", "Deploy Guide", vec![1.0, 0.0, 0.0, 0.0])]),
        ));
        let config = RetrievalConfig {
            mode: RetrievalStrategy::Semantic,
            ..RetrievalConfig::default()
        };
        let e = engine(lexical_index(), semantic, Arc::new(DownEmbedder), config);

        let result = e.retrieve("deploy").await.unwrap();
        assert_eq!(result.mode(), RetrievalMode::Lexical);
        assert_eq!(result.hits()[0].chunk.id, "deploy");
    }

    #[tokio::test]
    async fn test_semantic_failure_without_fallback_is_error() {
        let semantic = Arc::new(IndexProvider::preloaded(
            "semantic",
            Index::new(vec![embedded("deploy", "Deploy Guide", vec![1.0, 0.0, 0.0, 0.0])]),
        ));
        let config = RetrievalConfig {
            mode: RetrievalStrategy::Semantic,
            fallback_to_lexical: false,
            ..RetrievalConfig::default()
        };
        let e = engine(lexical_index(), semantic, Arc::new(DownEmbedder), config);

        let err = e.retrieve("deploy").await.unwrap_err();
        assert!(err.is_retrieval_failure());
    }

    #[tokio::test]
    async fn test_disabled_retrieval_is_empty() {
        let config = RetrievalConfig {
            enabled: false,
            ..RetrievalConfig::default()
        };
        let e = engine(lexical_index(), absent_index("semantic"), Arc::new(DownEmbedder), config);
        assert!(e.retrieve("deploy").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_composes_prompt_and_sources() {
        let e = engine(
            lexical_index(),
            absent_index("semantic"),
            Arc::new(DownEmbedder),
            RetrievalConfig::default(),
        )
        .with_system_prompt("You answer questions.");

        let rag = e.prepare("how do I deploy", RetrievalStrategy::Lexical).await.unwrap();
        assert!(rag.system_prompt.starts_with(
            "You answer questions.\n\nHere is relevant information from the documentation:\n\n--- Document 1: Deploy Guide ---"
        ));
        assert_eq!(rag.sources.len(), 1);
        assert_eq!(rag.sources[0].slug, "/docs/deploy");
        assert!(rag.is_augmented());
    }

    #[tokio::test]
    async fn test_prepare_without_matches_keeps_base_prompt() {
        let e = engine(
            lexical_index(),
            absent_index("semantic"),
            Arc::new(DownEmbedder),
            RetrievalConfig::default(),
        )
        .with_system_prompt("Base prompt.");

        let rag = e.prepare("zebra", RetrievalStrategy::Lexical).await.unwrap();
        assert_eq!(rag.system_prompt, "Base prompt.");
        assert!(rag.sources.is_empty());
    }
}
