//! Synapse Inference Server - Main Entry Point
//!
//! Loads the configured model and serves predictions over HTTP until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use synapse_inference::{
    config::{AppConfig, LogFormat, LoggingConfig, DEFAULT_CONFIG_PATH},
    feature_extractor::FeatureExtractor,
    metrics::{MetricsReporter, ServingMetrics},
    models::inference::InferenceEngine,
    server::{self, AppState},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Synapse inference server
#[derive(Parser, Debug)]
#[command(name = "synapse-server", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "SYNAPSE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("synapse_inference={}", logging.level).parse()?)
        .add_directive(format!("synapse_server={}", logging.level).parse()?)
        .add_directive("tower_http=info".parse()?);

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_from_path(&cli.config)?;
    init_logging(&config.logging)?;

    info!(config = %cli.config.display(), "Starting Synapse inference server");

    // Initialize metrics
    let metrics = Arc::new(ServingMetrics::new());

    // Load the model; the extension decides the runtime
    let engine = Arc::new(
        InferenceEngine::new(&config)
            .with_context(|| format!("Failed to load model {}", config.model.path))?,
    );

    let extractor = FeatureExtractor::new(config.features.names.iter().cloned());
    info!(
        features = ?extractor.feature_names(),
        "Feature extractor initialized ({} features)",
        extractor.feature_count()
    );

    // Start metrics reporter
    let reporter = MetricsReporter::new(Arc::clone(&metrics), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    let state = Arc::new(AppState::new(engine, extractor, Arc::clone(&metrics)));
    let app = server::router(state);

    let addr = config.server.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening for POST /predict");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Print final summary
    info!("Server shutting down...");
    metrics.print_summary();

    Ok(())
}
