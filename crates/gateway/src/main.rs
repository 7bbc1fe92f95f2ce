//! ABC Ledger API Gateway
//!
//! The main entry point for all external API requests.

use abcledger_common::{
    config::AppConfig,
    db::DbPool,
    metrics::{self, GENERATION_BUCKETS, LATENCY_BUCKETS},
    notes::create_generator,
    Repository,
};
use abcledger_gateway::{create_router, AppState};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::Notify};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting ABC Ledger API Gateway v{}",
        abcledger_common::VERSION
    );

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Suffix("request_duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Suffix("generation_duration_seconds".to_string()),
                GENERATION_BUCKETS,
            )?
            .install()?;
        info!("Metrics exporter listening on {}", addr);
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }

    let generator = create_generator(&config.generation)?;
    info!(model = %generator.model_name(), "Narrative generator ready");

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = config.shutdown_timeout();

    // Create app state
    let state = AppState::new(config, Arc::new(Repository::new(db)), generator)?;

    // Build the router
    let app = create_router(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);

    let stopping = Arc::new(Notify::new());
    let signalled = stopping.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        signalled.notify_one();
    });

    tokio::select! {
        result = async { server.await } => result?,
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => warn!(
            timeout_secs = shutdown_timeout.as_secs(),
            "Graceful shutdown timed out, dropping open connections"
        ),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
