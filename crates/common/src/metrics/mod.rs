//! Metrics and observability utilities
//!
//! Prometheus-style metrics through the `metrics` facade. Without an
//! installed recorder every call is a no-op.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use std::time::Instant;

/// Metrics prefix for all DocRAG metrics
pub const METRICS_PREFIX: &str = "docrag";

/// Buckets for embedding latency (in seconds)
pub const EMBEDDING_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Retrieval metrics
    describe_counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        Unit::Count,
        "Total retrieval calls by mode and outcome"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval latency in seconds"
    );

    describe_histogram!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of chunks returned per retrieval"
    );

    describe_counter!(
        format!("{}_lexical_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Semantic retrievals answered with lexical results"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding provider requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding provider errors"
    );

    // Index metrics
    describe_counter!(
        format!("{}_index_loads_total", METRICS_PREFIX),
        Unit::Count,
        "Index load attempts by outcome"
    );

    describe_gauge!(
        format!("{}_index_chunks", METRICS_PREFIX),
        Unit::Count,
        "Chunks in the loaded index"
    );

    tracing::info!("Metrics registered");
}

/// Outcome of one index source attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLoadOutcome {
    Loaded,
    Missing,
    Malformed,
    Failed,
}

impl IndexLoadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexLoadOutcome::Loaded => "loaded",
            IndexLoadOutcome::Missing => "missing",
            IndexLoadOutcome::Malformed => "malformed",
            IndexLoadOutcome::Failed => "failed",
        }
    }
}

pub fn record_index_load(index: &str, outcome: IndexLoadOutcome) {
    counter!(
        format!("{}_index_loads_total", METRICS_PREFIX),
        "index" => index.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn set_index_chunks(index: &str, count: usize) {
    gauge!(
        format!("{}_index_chunks", METRICS_PREFIX),
        "index" => index.to_string()
    )
    .set(count as f64);
}

pub fn record_lexical_fallback() {
    counter!(format!("{}_lexical_fallbacks_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record retrieval metrics
pub struct RetrievalMetrics {
    start: Instant,
    mode: &'static str,
}

impl RetrievalMetrics {
    /// Start tracking a retrieval
    pub fn start(mode: &'static str) -> Self {
        Self {
            start: Instant::now(),
            mode,
        }
    }

    /// Record a completed retrieval
    pub fn success(self, result_count: usize) {
        self.finish("ok");
        histogram!(
            format!("{}_retrieval_results_count", METRICS_PREFIX),
            "mode" => self.mode
        )
        .record(result_count as f64);
    }

    /// Record a retrieval that found no index
    pub fn no_index(self) {
        self.finish("no_index");
    }

    /// Record a failed retrieval
    pub fn failure(self) {
        self.finish("error");
    }

    fn finish(&self, outcome: &'static str) {
        counter!(
            format!("{}_retrievals_total", METRICS_PREFIX),
            "mode" => self.mode,
            "outcome" => outcome
        )
        .increment(1);

        histogram!(
            format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
            "mode" => self.mode
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

/// Helper to record embedding metrics
pub struct EmbeddingMetrics {
    start: Instant,
    model: String,
}

impl EmbeddingMetrics {
    pub fn start(model: &str) -> Self {
        counter!(
            format!("{}_embedding_requests_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);

        Self {
            start: Instant::now(),
            model: model.to_string(),
        }
    }

    pub fn success(self) {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => self.model
        )
        .record(self.start.elapsed().as_secs_f64());
    }

    pub fn failure(self, error_code: &'static str) {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => self.model,
            "code" => error_code
        )
        .increment(1);
    }
}
