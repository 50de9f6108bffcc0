//! modgate server
//!
//! Zero-shot text moderation over HTTP. Texts are scored against caller
//! supplied labels by a local NLI model or a hosted inference API.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

use modgate_server::{create_router, AppState, Overrides, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "modgate-server")]
#[command(about = "Zero-shot text moderation service", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "modgate.yaml")]
    config: String,

    /// Listen address
    #[arg(short = 'l', long, env = "MODGATE_ADDRESS")]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, env = "MODGATE_PORT")]
    port: Option<u16>,

    /// Threshold applied when a request does not carry one
    #[arg(long, env = "DEFAULT_THRESHOLD")]
    default_threshold: Option<f32>,

    /// Model used when a request does not name one
    #[arg(long, env = "DEFAULT_MODEL")]
    default_model: Option<String>,

    /// Maximum texts per request; extra texts are dropped
    #[arg(long, env = "MODGATE_MAX_TEXTS")]
    max_texts: Option<usize>,

    /// Comma-separated allowed CORS origins ("*" for any)
    #[arg(long, env = "MODGATE_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Option<Vec<String>>,

    /// API token for hosted inference
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    hf_token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            address: self.listen.clone(),
            port: self.port,
            default_threshold: self.default_threshold,
            default_model: self.default_model.clone(),
            max_texts: self.max_texts,
            cors_origins: self.cors_origins.clone(),
            hf_token: self.hf_token.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);

    info!("Starting modgate server");

    // Load configuration
    let config = ServerConfig::load(&cli.config, cli.overrides())?;
    info!("Configuration loaded successfully");
    info!("Default model: {}", config.classifiers.service.default_model);
    info!("Default threshold: {}", config.classifiers.service.default_threshold);
    info!("Catalog models: {}", config.classifiers.models.len());

    let addr: SocketAddr = format!("{}:{}", config.listen.address, config.listen.port).parse()?;

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    let state = AppState::new(config, metrics_handle).await?;
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
        EnvFilter::new("modgate_server=debug,modgate_classifiers=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("modgate_server=info,modgate_classifiers=info,tower_http=info")
        })
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
        "modgate_requests_total",
        "Total number of classification requests received"
    );
    metrics::describe_counter!("modgate_errors_total", "Total number of failed requests by kind");
    metrics::describe_counter!(
        "modgate_backend_retries_total",
        "Remote backend attempts retried after a transient failure"
    );
    metrics::describe_counter!(
        "modgate_texts_classified_total",
        "Total number of texts classified"
    );
    metrics::describe_histogram!(
        "modgate_request_latency_us",
        metrics::Unit::Microseconds,
        "Classification request latency in microseconds"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
