//! Shared ranking for both retrieval modes

use super::ScoredChunk;
use std::cmp::Ordering;

/// Drop entries below `threshold`, order best first, keep `top_k`.
///
/// The sort is stable: equal scores keep their input order.
pub fn rank(scored: Vec<ScoredChunk>, top_k: usize, threshold: f32) -> Vec<ScoredChunk> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut kept: Vec<ScoredChunk> = scored
        .into_iter()
        .filter(|s| s.score >= threshold)
        .collect();

    kept.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    kept.truncate(top_k);
    kept
}
