//! Lexical search by keyword overlap
//!
//! Curated keywords weigh three times a content word, and any overlap with the
//! title adds a flat boost. Chunks with no overlap at all are never candidates.

use super::ranker::rank;
use super::tokenizer::tokenize;
use super::{score_chunks, RetrievalMode, RetrievalResult, Retriever, Scorer, SearchRequest};
use docrag_common::errors::Result;
use docrag_common::index::{Chunk, IndexProvider};
use docrag_common::metrics::RetrievalMetrics;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const KEYWORD_WEIGHT: f32 = 3.0;
const CONTENT_WEIGHT: f32 = 1.0;
const TITLE_BOOST: f32 = 5.0;

/// Keyword-overlap score of one chunk against pre-tokenized query words
pub fn lexical_score(query_tokens: &HashSet<String>, chunk: &Chunk) -> f32 {
    let content_tokens = tokenize(&chunk.content);
    if chunk.keywords.is_empty() && content_tokens.is_empty() {
        return 0.0;
    }

    let keyword_overlap = query_tokens.intersection(&chunk.keywords).count();
    let content_overlap = query_tokens.intersection(&content_tokens).count();

    let mut score =
        keyword_overlap as f32 * KEYWORD_WEIGHT + content_overlap as f32 * CONTENT_WEIGHT;

    let title_tokens = tokenize(&chunk.title);
    if !query_tokens.is_disjoint(&title_tokens) {
        score += TITLE_BOOST;
    }

    score
}

/// Scores chunks against one query
pub struct LexicalScorer {
    query_tokens: HashSet<String>,
}

impl LexicalScorer {
    pub fn new(query: &str) -> Self {
        Self::from_tokens(tokenize(query))
    }

    pub fn from_tokens(query_tokens: HashSet<String>) -> Self {
        Self { query_tokens }
    }
}

impl Scorer for LexicalScorer {
    fn score(&self, chunk: &Chunk) -> Option<f32> {
        let score = lexical_score(&self.query_tokens, chunk);
        (score > 0.0).then_some(score)
    }
}

/// Lexical retriever over the keyword index
pub struct LexicalRetriever {
    index: Arc<IndexProvider>,
}

impl LexicalRetriever {
    pub fn new(index: Arc<IndexProvider>) -> Self {
        Self { index }
    }

    /// Never fails: a missing index yields an empty result
    pub async fn search(&self, query: &str, top_k: usize) -> RetrievalResult {
        let metrics = RetrievalMetrics::start(RetrievalMode::Lexical.as_str());

        let Some(index) = self.index.load().await else {
            metrics.no_index();
            return RetrievalResult::empty(RetrievalMode::Lexical);
        };

        let scorer = LexicalScorer::new(query);
        let candidates = score_chunks(&index, &scorer);
        let candidate_count = candidates.len();
        let hits = rank(candidates, top_k, 0.0);

        debug!(
            candidates = candidate_count,
            returned = hits.len(),
            top_k,
            "Lexical retrieval complete"
        );
        metrics.success(hits.len());

        RetrievalResult::new(RetrievalMode::Lexical, hits)
    }
}

#[async_trait::async_trait]
impl Retriever for LexicalRetriever {
    async fn retrieve(&self, request: &SearchRequest) -> Result<RetrievalResult> {
        Ok(self.search(&request.query, request.limit).await)
    }

    fn mode(&self) -> RetrievalMode {
        RetrievalMode::Lexical
    }
}
