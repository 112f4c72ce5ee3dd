//! Context Assembler - renders ranked chunks for the prompt
//!
//! Output is a pure function of the input: the same `RetrievalResult` always
//! renders to the same bytes.

use crate::retrieval::{RetrievalMode, RetrievalResult, ScoredChunk};
use serde::{Deserialize, Serialize};

/// Fixed first line of every non-empty context block
pub const CONTEXT_INTRO: &str = "Here is relevant information from the documentation:";

/// Shown for lexical chunks without a title; vector headers keep the raw title
const UNTITLED: &str = "Unknown";

/// Citation for one chunk in the context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub slug: String,
    pub source: String,

    /// Vector mode only, rounded to 4 decimal places
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// Context text plus the sources it was built from, in the same order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub context_text: String,
    pub sources: Vec<SourceRef>,
}

impl AssembledContext {
    /// Empty context means "no augmentation", not an error
    pub fn is_empty(&self) -> bool {
        self.context_text.is_empty()
    }
}

/// Renders a `RetrievalResult` into an `AssembledContext`
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    intro: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(CONTEXT_INTRO)
    }
}

impl ContextAssembler {
    pub fn new(intro: impl Into<String>) -> Self {
        Self { intro: intro.into() }
    }

    pub fn assemble(&self, result: &RetrievalResult) -> AssembledContext {
        if result.is_empty() {
            return AssembledContext::default();
        }

        let annotate = result.mode() == RetrievalMode::Vector;

        let mut lines: Vec<String> = Vec::with_capacity(1 + result.len() * 4);
        lines.push(format!("{}\n", self.intro));

        let mut sources = Vec::with_capacity(result.len());

        for (position, hit) in result.hits().iter().enumerate() {
            let similarity = annotate.then(|| round4(hit.score));

            lines.push(header(position + 1, hit, similarity));
            let source = hit.chunk.source_str();
            if !source.is_empty() {
                lines.push(format!("Source: {}", source));
            }
            lines.push(hit.chunk.content.clone());
            lines.push(String::new());

            sources.push(SourceRef {
                title: hit.chunk.title.clone(),
                slug: hit.chunk.slug.clone(),
                source: source.to_string(),
                similarity,
            });
        }

        AssembledContext {
            context_text: lines.join("\n"),
            sources,
        }
    }
}

/// Assemble with the standard intro line
pub fn assemble(result: &RetrievalResult) -> AssembledContext {
    ContextAssembler::default().assemble(result)
}

fn header(rank: usize, hit: &ScoredChunk, similarity: Option<f32>) -> String {
    let title = if hit.chunk.title.is_empty() && similarity.is_none() {
        UNTITLED
    } else {
        hit.chunk.title.as_str()
    };

    match similarity {
        Some(similarity) => format!(
            "--- Document {}: {} (relevance: {:.0}%) ---",
            rank,
            title,
            f64::from(similarity) * 100.0
        ),
        None => format!("--- Document {}: {} ---", rank, title),
    }
}

fn round4(value: f32) -> f32 {
    ((f64::from(value) * 10_000.0).round() / 10_000.0) as f32
}
