//! Chunk records and the validated index snapshot

use crate::errors::{AppError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A unit of retrievable content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique within one index
    pub id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    /// Routing/display identifier
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,

    /// Human-readable provenance
    #[serde(default)]
    pub source: Option<String>,

    pub content: String,

    /// Curator-supplied keywords
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: HashSet<String>,

    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Chunk {
    /// Source line, if the chunk carries a non-empty one
    pub fn source_str(&self) -> &str {
        self.source.as_deref().unwrap_or("")
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }
}

/// Wire shape: everything except the top-level `chunks` field is ignored,
/// and records are validated one by one.
#[derive(Deserialize)]
struct RawIndex {
    chunks: Vec<serde_json::Value>,
}

/// Immutable snapshot of the loaded chunks
#[derive(Debug, Clone, Default)]
pub struct Index {
    chunks: Vec<Arc<Chunk>>,
    dimension: Option<usize>,
}

impl Index {
    /// Build from already-typed chunks, enforcing the same invariants as parsing
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self::validated(chunks, "memory")
    }

    /// Parse index bytes. Malformed records are skipped, the whole document
    /// must still have a `chunks` array.
    pub fn from_slice(bytes: &[u8], source_name: &str) -> Result<Self> {
        let raw: RawIndex = serde_json::from_slice(bytes).map_err(|e| AppError::MalformedIndex {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;

        let mut chunks = Vec::with_capacity(raw.chunks.len());
        for (position, value) in raw.chunks.into_iter().enumerate() {
            match serde_json::from_value::<Chunk>(value) {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => tracing::warn!(
                    source = source_name,
                    position,
                    error = %e,
                    "Skipping malformed chunk record"
                ),
            }
        }

        Ok(Self::validated(chunks, source_name))
    }

    fn validated(chunks: Vec<Chunk>, source_name: &str) -> Self {
        let mut seen = HashSet::with_capacity(chunks.len());
        let mut dimension = None;
        let mut kept = Vec::with_capacity(chunks.len());

        for mut chunk in chunks {
            if !seen.insert(chunk.id.clone()) {
                tracing::warn!(source = source_name, id = %chunk.id, "Skipping duplicate chunk id");
                continue;
            }

            if chunk.embedding.as_ref().is_some_and(|e| e.is_empty()) {
                chunk.embedding = None;
            }

            if let Some(len) = chunk.embedding.as_ref().map(Vec::len) {
                match dimension {
                    None => dimension = Some(len),
                    Some(expected) if expected != len => {
                        tracing::warn!(
                            source = source_name,
                            id = %chunk.id,
                            expected,
                            actual = len,
                            "Dropping embedding with mismatched dimension"
                        );
                        chunk.embedding = None;
                    }
                    Some(_) => {}
                }
            }

            kept.push(Arc::new(chunk));
        }

        Self { chunks: kept, dimension }
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Shared length of every embedding in the index
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn embedded_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.embedding.is_some()).count()
    }
}
