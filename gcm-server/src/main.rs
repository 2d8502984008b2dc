//! gcm-server - Group Concept Mapping workshop service
//!
//! Serves the project, brainstorming, clustering, rating, analysis and
//! export API over HTTP, with per-project change streams as SSE.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gcm_common::config;
use gcm_common::db::init_database;
use gcm_server::{build_router, AppState};

/// Command-line arguments for gcm-server
#[derive(Parser, Debug)]
#[command(name = "gcm-server")]
#[command(about = "Group Concept Mapping workshop service")]
#[command(version)]
struct Args {
    /// Root folder holding gcm.toml and the database
    #[arg(short, long, env = "GCM_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Explicit configuration file (overrides <root>/gcm.toml)
    #[arg(short, long, env = "GCM_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides bind_addr from the config file)
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (root_folder, config) = config::load(args.root_folder.as_deref(), args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting GCM server (gcm-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", root_folder.display());

    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;

    let db_path = config.database_path(&root_folder);
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database ready: {}", db_path.display());

    info!(
        engine = %config.ai.clustering_engine,
        latency_ms = config.ai.simulated_latency_ms,
        allow_backward = config.workflow.allow_backward_transitions,
        min_statements = config.workflow.min_statements_to_structure,
        "Service configuration"
    );

    let state = AppState::new(pool.clone(), &config);
    let app = build_router(state);

    let addr = args.bind.unwrap_or(config.bind_addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
