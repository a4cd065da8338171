//! ACCloner Learning Session (accloner-ls) - Main entry point
//!
//! Runs the IR signal learning session: a TCP listener for the hardware
//! transmitter, the catalog store, and the interactive operator console.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accloner_ls::config::Config;
use accloner_ls::{console, SessionController};

/// Command-line arguments for accloner-ls
#[derive(Parser, Debug)]
#[command(name = "accloner-ls")]
#[command(about = "IR signal learning session service for ACCloner")]
#[command(version)]
struct Args {
    /// Port the transmitter listener binds to
    #[arg(short, long, default_value = "4131", env = "ACCLONER_PORT")]
    port: u16,

    /// Interface the transmitter listener binds to
    #[arg(long, default_value = "0.0.0.0", env = "ACCLONER_BIND")]
    bind: String,

    /// Catalog database path or sqlite URL
    #[arg(short, long)]
    database: Option<String>,

    /// Disconnect an idle transmitter after this many seconds
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accloner_ls=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    info!("Starting ACCloner learning session on port {}", args.port);

    // Resolve the catalog database location (CLI > env > config file > default)
    let database_url =
        accloner_common::config::resolve_database_url(args.database.as_deref(), "ACCLONER_DB")
            .context("Failed to resolve catalog database location")?;
    info!("Catalog database: {}", database_url);

    let config = Config {
        bind: args.bind,
        port: args.port,
        database_url,
        idle_timeout: args.idle_timeout_secs.map(Duration::from_secs),
    };

    // The controller connects to the store in the background; the console
    // starts listening (deferred until the store is ready)
    let controller = Arc::new(SessionController::new(config));

    tokio::select! {
        result = console::run(Arc::clone(&controller)) => {
            result.context("Console error")?;
            info!("Console closed");
        }
        _ = shutdown_signal() => {}
    }

    controller.stop_listening().await;
    info!("Session shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
