//! fitcheck Server
//!
//! Serves fit predictions over HTTP from a directory of per-category
//! classifier artifacts produced by `fitcheck-train`.

use anyhow::Result;
use clap::Parser;
use fitcheck_server::{create_router, AppState, ConfigOverrides, ServerConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fitcheck-server")]
#[command(about = "fitcheck fit prediction service", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "fitcheck.yaml")]
    config: PathBuf,

    /// Directory of trained category models
    #[arg(short, long)]
    models_dir: Option<PathBuf>,

    /// Listen address
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        listen: cli.listen.clone(),
        port: cli.port,
        models_dir: cli.models_dir.clone(),
    };
    let config = ServerConfig::load(&cli.config, &overrides)?;

    init_tracing(cli.verbose, config.log_json);

    info!("Starting fitcheck server");
    info!("Models directory: {}", config.models_dir.display());

    let metrics_handle = init_metrics()?;

    // A corrupt artifact aborts startup here
    let state = AppState::load(config.clone(), metrics_handle)?;
    if state.dispatcher.loaded_categories().is_empty() {
        warn!("No models loaded; every prediction will be rejected");
    }

    let addr: SocketAddr = config.bind_address().parse()?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("fitcheck=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fitcheck=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "fitcheck_predictions_total",
        "Total number of prediction requests by category and outcome"
    );
    metrics::describe_histogram!(
        "fitcheck_prediction_latency_us",
        metrics::Unit::Microseconds,
        "Dispatch latency in microseconds by category"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
