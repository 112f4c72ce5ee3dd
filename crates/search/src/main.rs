//! DocRAG Search CLI
//!
//! Runs one retrieval against the configured index and prints the composed
//! system prompt and the source list:
//!
//! ```text
//! search [lexical|semantic|auto] <query...>
//! ```

use docrag_common::config::{AppConfig, ObservabilityConfig, RetrievalStrategy};
use docrag_common::{metrics, VERSION};
use docrag_search::RetrievalEngine;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tracing::{error, info, info_span, Instrument, Span};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.observability);

    let span = service_span(&config.observability);
    run(config).instrument(span).await
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting DocRAG search v{}", VERSION);

    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }

    let (strategy, query) = parse_args(std::env::args().skip(1).collect(), config.retrieval.mode)?;

    let engine = RetrievalEngine::from_config(&config).await.map_err(|e| {
        error!(error = %e, "Failed to build retrieval engine");
        e
    })?;

    let rag = engine.prepare(&query, strategy).await.map_err(|e| {
        error!(error = %e, code = e.code().label(), "Retrieval failed");
        e
    })?;

    info!(
        strategy = ?strategy,
        sources = rag.sources.len(),
        augmented = rag.is_augmented(),
        "Retrieval complete"
    );

    println!("{}", rag.system_prompt);
    println!();
    println!("{}", serde_json::to_string_pretty(&rag.sources)?);

    Ok(())
}

/// `[lexical|semantic|auto] <query...>`; a leading word that is not a mode
/// is part of the query and the configured mode is used.
fn parse_args(
    args: Vec<String>,
    configured: RetrievalStrategy,
) -> Result<(RetrievalStrategy, String), String> {
    let (strategy, rest) = match args.first().map(String::as_str) {
        Some("lexical") => (RetrievalStrategy::Lexical, &args[1..]),
        Some("semantic") => (RetrievalStrategy::Semantic, &args[1..]),
        Some("auto") => (configured, &args[1..]),
        _ => (configured, &args[..]),
    };

    let query = rest.join(" ");
    if query.trim().is_empty() {
        return Err("usage: search [lexical|semantic|auto] <query...>".to_string());
    }

    Ok((strategy, query))
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Root span carrying the service name on every event
fn service_span(observability: &ObservabilityConfig) -> Span {
    info_span!("service", service = %observability.service_name)
}

fn install_metrics_exporter(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("embedding_duration_seconds".to_string()),
            metrics::EMBEDDING_BUCKETS,
        )?
        .install()?;

    metrics::register_metrics();
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}
