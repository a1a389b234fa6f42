//! Echo Heartbeat Server
//!
//! WebSocket server that echoes every message back to its sender and pushes a
//! `{count, time}` heartbeat to each connected client on a fixed interval.

mod config;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Settings;
use server::{ServerConfig, WebSocketServer};

/// Echo Heartbeat Server
///
/// WebSocket echo server with a periodic heartbeat
#[derive(Parser, Debug)]
#[command(name = "echo-heartbeat")]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on [default: 3000]
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long)]
    bind: Option<String>,

    /// Seconds between heartbeats, 1 to 86400 [default: 5]
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(u64).range(1..=server::MAX_HEARTBEAT_INTERVAL_SECS)
    )]
    interval: Option<u64>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Echo Heartbeat v{}", env!("CARGO_PKG_VERSION"));

    let settings = load_settings(&args)?;
    let config = ServerConfig::from(&settings);

    info!(
        "Heartbeat every {}s on {}",
        config.heartbeat_interval_secs,
        config.socket_addr()
    );

    // Create and start the WebSocket server
    let server = Arc::new(WebSocketServer::new(config));
    let server_handle = Arc::clone(&server);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Initiating graceful shutdown...");
        server_handle.shutdown();
    });

    // Run the server
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve settings: CLI flag / `PORT` > config file > defaults
fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Settings::default(),
    };
    let settings = settings.with_overrides(args.bind.clone(), args.port, args.interval)?;
    Ok(settings)
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
