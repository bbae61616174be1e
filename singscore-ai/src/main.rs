//! singscore-ai - Singing Analysis Microservice
//!
//! Accepts a recording over HTTP, runs it through the analysis pipeline and
//! answers with a scored performance report. The live path (object storage
//! plus speech transcription) is resolved once at startup; without it the
//! service still answers every request with a simulated report.

use anyhow::{Context, Result};
use clap::Parser;
use singscore_common::events::EventBus;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use singscore_ai::config::{ServiceConfig, CONFIG_ENV_VAR};
use singscore_ai::services::AnalysisOrchestrator;
use singscore_ai::AppState;

/// Command-line arguments for singscore-ai
#[derive(Parser, Debug)]
#[command(name = "singscore-ai")]
#[command(about = "Singing analysis microservice")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config)
    #[arg(short, long, env = "SINGSCORE_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "singscore_ai=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting singscore-ai (Singing Analysis) microservice");
    info!(
        "Version: {} ({} built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = ServiceConfig::load(args.config.as_deref());
    if let Some(bind) = args.bind {
        config.bind_address = Some(bind);
    }

    let event_bus = EventBus::new(config.analysis.event_capacity.max(1));
    info!("Event bus initialized (capacity {})", event_bus.capacity());
    let orchestrator = AnalysisOrchestrator::connect(&config, event_bus).await;
    if !orchestrator.capabilities().live_path() {
        warn!("Live analysis path unavailable; reports will be simulated");
    }

    let state = AppState::new(orchestrator);
    let app = singscore_ai::build_router(state);

    let bind_address = config.bind_address().to_string();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;

    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
