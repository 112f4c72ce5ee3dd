//! DocRAG Search
//!
//! Request-time retrieval for documentation-grounded generation:
//! - Lexical retrieval (keyword overlap with title boost)
//! - Vector retrieval (cosine similarity of embeddings)
//! - Shared ranking and context assembly

pub mod context;
pub mod retrieval;

pub use context::{assemble, compose_system_prompt, AssembledContext, RagContext, SourceRef};
pub use retrieval::{
    RetrievalEngine, RetrievalMode, RetrievalResult, Retriever, ScoredChunk, SearchRequest,
};
