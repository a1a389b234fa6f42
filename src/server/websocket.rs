//! WebSocket server implementation
//!
//! Provides a WebSocket server that listens on a configurable port and runs
//! one echo-heartbeat [`Session`] per accepted connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};

use super::handler::{shutdown_requested, Session, SessionSummary};
use super::protocol::DEFAULT_HEARTBEAT_INTERVAL_SECS;
use crate::config::Settings;

/// How long shutdown waits for open sessions to finish closing
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Configuration for the WebSocket server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
    /// Seconds between heartbeats on each session
    pub heartbeat_interval_secs: u64,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(bind: String, port: u16) -> Self {
        Self {
            bind,
            port,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        }
    }

    /// Set the heartbeat interval
    pub fn with_heartbeat_interval(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl From<&Settings> for ServerConfig {
    fn from(settings: &Settings) -> Self {
        Self::new(settings.server.bind.clone(), settings.server.port)
            .with_heartbeat_interval(settings.heartbeat.interval_secs)
    }
}

/// Keeps the live-session count accurate however a connection task exits
struct SessionGuard(Arc<AtomicUsize>);

impl SessionGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// WebSocket echo-heartbeat server
pub struct WebSocketServer {
    config: ServerConfig,
    active_sessions: Arc<AtomicUsize>,
    /// Latched shutdown flag; receivers created later still observe it
    shutdown_tx: watch::Sender<bool>,
}

impl WebSocketServer {
    /// Create a new WebSocket server
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            active_sessions: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Number of sessions currently open
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Trigger server shutdown
    ///
    /// Safe to call before `serve` starts: the request is remembered.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Bind the listening socket
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr).await?;
        Ok(listener)
    }

    /// Run the WebSocket server
    ///
    /// Binds the configured address, then serves until shutdown.
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` until a shutdown signal is received
    ///
    /// Each connection is handled concurrently on its own task. On shutdown,
    /// open sessions are told to close and given a short grace period.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let local_addr = listener.local_addr()?;
        info!("WebSocket server listening on ws://{}", local_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                // Accept new connections
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let shutdown_rx = self.shutdown_tx.subscribe();
                            let active = Arc::clone(&self.active_sessions);
                            let interval_secs = self.config.heartbeat_interval_secs;

                            connections.spawn(async move {
                                if let Err(e) = handle_connection(stream, peer_addr, interval_secs, shutdown_rx, active).await {
                                    error!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                // Reap finished connection tasks
                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = result {
                        error!("Connection task failed: {}", e);
                    }
                }
                // Handle shutdown signal
                _ = shutdown_requested(&mut shutdown_rx) => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        // Wait for active connections to finish
        let session_count = self.active_sessions();
        if session_count > 0 {
            info!("Waiting for {} active sessions to close...", session_count);
        }
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                "{} connections still open after {:?}, aborting",
                connections.len(),
                SHUTDOWN_GRACE
            );
            connections.shutdown().await;
        }

        Ok(())
    }
}

/// Handle a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    interval_secs: u64,
    shutdown_rx: watch::Receiver<bool>,
    active: Arc<AtomicUsize>,
) -> anyhow::Result<SessionSummary> {
    info!("New connection from {}", peer_addr);

    // Upgrade to WebSocket
    let ws_stream = accept_async(stream).await?;
    let (ws_sender, ws_receiver) = ws_stream.split();
    debug!("WebSocket handshake completed with {}", peer_addr);

    let _guard = SessionGuard::new(active);
    let session = Session::new(peer_addr, interval_secs);
    let summary = session.run(ws_sender, ws_receiver, shutdown_rx).await;

    info!("Connection from {} closed", peer_addr);
    Ok(summary)
}
