//! Retrieval over the in-memory chunk index
//!
//! Provides two retrieval modes sharing one ranker:
//! - Lexical search (keyword overlap)
//! - Vector search (cosine similarity of embeddings)
//!
//! A `Scorer` turns each chunk into an optional score, `score_chunks` collects
//! the candidates, and `rank` orders and cuts them.

mod engine;
mod lexical;
mod ranker;
mod tokenizer;
mod vector;

pub use engine::RetrievalEngine;
pub use lexical::{lexical_score, LexicalRetriever, LexicalScorer};
pub use ranker::rank;
pub use tokenizer::tokenize;
pub use vector::{cosine_similarity, VectorRetriever, VectorScorer};

use docrag_common::errors::Result;
use docrag_common::index::{Chunk, Index};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default number of chunks returned
pub const DEFAULT_TOP_K: usize = 5;

/// Default minimum cosine similarity for vector results
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;

/// Retrieval mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Keyword overlap scoring
    Lexical,
    /// Embedding similarity
    Vector,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Lexical => "lexical",
            RetrievalMode::Vector => "vector",
        }
    }
}

/// Chunk paired with its relevance score
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Arc<Chunk>,
    pub score: f32,
}

/// Ranked chunks, best first, at most top-K long
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    mode: RetrievalMode,
    hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn new(mode: RetrievalMode, hits: Vec<ScoredChunk>) -> Self {
        Self { mode, hits }
    }

    /// No index, or nothing relevant
    pub fn empty(mode: RetrievalMode) -> Self {
        Self::new(mode, Vec::new())
    }

    pub fn mode(&self) -> RetrievalMode {
        self.mode
    }

    pub fn hits(&self) -> &[ScoredChunk] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn into_hits(self) -> Vec<ScoredChunk> {
        self.hits
    }
}

/// Search request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text
    pub query: String,

    /// Maximum results to return
    pub limit: usize,

    /// Minimum score threshold (vector mode only; lexical always cuts at 0)
    pub min_score: Option<f32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            min_score: None,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self::new(String::new(), DEFAULT_TOP_K)
    }
}

/// Relevance of one chunk to a prepared query
pub trait Scorer {
    /// `None` keeps the chunk out of the candidate set entirely
    fn score(&self, chunk: &Chunk) -> Option<f32>;
}

/// Score every chunk, keeping index order for the candidates
pub fn score_chunks<S: Scorer + ?Sized>(index: &Index, scorer: &S) -> Vec<ScoredChunk> {
    index
        .chunks()
        .iter()
        .filter_map(|chunk| {
            scorer.score(chunk).map(|score| ScoredChunk {
                chunk: Arc::clone(chunk),
                score,
            })
        })
        .collect()
}

/// Common trait for all retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve chunks matching the query
    async fn retrieve(&self, request: &SearchRequest) -> Result<RetrievalResult>;

    /// Get the retrieval mode
    fn mode(&self) -> RetrievalMode;
}
