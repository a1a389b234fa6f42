//! WebSocket connection handler
//!
//! A `Session` is created for every accepted connection. It echoes inbound
//! data frames back verbatim and pushes a [`Heartbeat`] on a fixed interval
//! until the connection closes, errors, or the server shuts down.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::heartbeat::HeartbeatTimer;
use super::protocol::Heartbeat;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame or the stream ended
    ClientClosed,
    /// The transport reported an error
    TransportError,
    /// Writing to the client failed
    SendFailed,
    /// The server is shutting down
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::ClientClosed => "client closed",
            CloseReason::TransportError => "transport error",
            CloseReason::SendFailed => "send failed",
            CloseReason::Shutdown => "server shutdown",
        };
        f.write_str(reason)
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed(CloseReason),
}

/// Final accounting for a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session ID
    pub id: Uuid,
    /// Heartbeat ticks taken (the last `count` value)
    pub message_count: u64,
    /// Heartbeats actually written to the client
    pub heartbeats_sent: u64,
    /// Inbound data messages echoed
    pub echoed: u64,
    /// Why the session ended
    pub reason: CloseReason,
}

/// Server-side state for one client connection
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    peer: SocketAddr,
    interval_secs: u64,
    message_count: u64,
    heartbeats_sent: u64,
    echoed: u64,
    state: SessionState,
    timer: HeartbeatTimer,
}

impl Session {
    /// Open a session and start its heartbeat timer
    ///
    /// `interval_secs` must be at least 1.
    pub fn new(peer: SocketAddr, interval_secs: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            interval_secs,
            message_count: 0,
            heartbeats_sent: 0,
            echoed: 0,
            state: SessionState::Open,
            timer: HeartbeatTimer::start(Duration::from_secs(interval_secs)),
        }
    }

    /// Get the session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the remote address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Get the heartbeat interval in seconds
    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    /// Number of heartbeat ticks taken so far
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if the session is still open
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Whether the heartbeat timer is still running
    pub fn timer_active(&self) -> bool {
        self.timer.is_active()
    }

    /// Handle an inbound frame, returning the reply to send (if any)
    ///
    /// Data frames come back unchanged. Control frames produce no reply;
    /// the transport answers pings on its own.
    pub fn on_message(&mut self, msg: Message) -> Option<Message> {
        if !self.is_open() {
            return None;
        }

        match msg {
            Message::Text(text) => {
                info!("received from {}: {}", self.peer, text);
                self.echoed += 1;
                Some(Message::Text(text))
            }
            Message::Binary(data) => {
                info!("received from {}: {} bytes (binary)", self.peer, data.len());
                self.echoed += 1;
                Some(Message::Binary(data))
            }
            Message::Ping(_) | Message::Pong(_) => {
                trace!("Control frame from {}", self.peer);
                None
            }
            Message::Close(frame) => {
                debug!("Client {} requested close: {:?}", self.peer, frame);
                self.close(CloseReason::ClientClosed);
                None
            }
            Message::Frame(_) => None,
        }
    }

    /// Handle a timer tick, returning the heartbeat to send
    ///
    /// A tick on a closed session is a no-op.
    pub fn on_tick(&mut self) -> Option<Heartbeat> {
        if !self.is_open() {
            self.timer.cancel();
            return None;
        }

        self.message_count += 1;
        Some(Heartbeat::new(self.message_count, self.interval_secs))
    }

    /// Handle a transport error; the session ends
    pub fn on_error(&mut self, err: &WsError) {
        error!("WebSocket error from {}: {}", self.peer, err);
        self.close(CloseReason::TransportError);
    }

    /// Close the session and cancel its timer
    ///
    /// Idempotent: the first reason is kept.
    pub fn close(&mut self, reason: CloseReason) {
        if self.is_open() {
            self.state = SessionState::Closed(reason);
            debug!("Session {} closed: {}", self.id, reason);
        }
        if self.timer.cancel() {
            debug!("Heartbeat timer for session {} cancelled", self.id);
        }
    }

    /// Drive the session until the connection ends
    ///
    /// Inbound frames, heartbeat ticks and the shutdown signal are handled
    /// from a single loop, so events for one connection never run concurrently.
    pub async fn run<S, R>(
        mut self,
        mut sink: S,
        mut stream: R,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SessionSummary
    where
        S: Sink<Message, Error = WsError> + Unpin,
        R: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        info!(
            "Session {} opened for {} (heartbeat every {}s)",
            self.id, self.peer, self.interval_secs
        );

        while self.is_open() {
            tokio::select! {
                msg = stream.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if let Some(reply) = self.on_message(msg) {
                                self.send(&mut sink, reply).await;
                            }
                        }
                        Some(Err(e)) => self.on_error(&e),
                        None => {
                            info!("Connection closed by {}", self.peer);
                            self.close(CloseReason::ClientClosed);
                        }
                    }
                }
                _ = self.timer.tick() => {
                    if let Some(heartbeat) = self.on_tick() {
                        match heartbeat.to_message() {
                            Ok(msg) => {
                                debug!("Heartbeat {} to {}", heartbeat.count, self.peer);
                                if self.send(&mut sink, msg).await {
                                    self.heartbeats_sent += 1;
                                }
                            }
                            Err(e) => error!("Failed to encode heartbeat for {}: {}", self.peer, e),
                        }
                    }
                }
                _ = shutdown_requested(&mut shutdown_rx) => {
                    info!("Shutdown signal received, closing connection to {}", self.peer);
                    let _ = sink.send(Message::Close(None)).await;
                    self.close(CloseReason::Shutdown);
                }
            }
        }

        let _ = sink.close().await;

        let summary = self.summary();
        info!(
            "Session {} for {} ended ({}): {} heartbeats sent, {} echoed",
            summary.id, self.peer, summary.reason, summary.heartbeats_sent, summary.echoed
        );
        summary
    }

    /// Send a frame, closing the session if the write fails
    ///
    /// Returns whether the frame was written.
    async fn send<S>(&mut self, sink: &mut S, msg: Message) -> bool
    where
        S: Sink<Message, Error = WsError> + Unpin,
    {
        if !self.is_open() {
            return false;
        }
        match sink.send(msg).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send to {}: {}", self.peer, e);
                self.close(CloseReason::SendFailed);
                false
            }
        }
    }

    fn summary(&self) -> SessionSummary {
        let reason = match self.state {
            SessionState::Closed(reason) => reason,
            SessionState::Open => CloseReason::Shutdown,
        };
        SessionSummary {
            id: self.id,
            message_count: self.message_count,
            heartbeats_sent: self.heartbeats_sent,
            echoed: self.echoed,
            reason,
        }
    }
}

/// Resolves once shutdown has been requested, or the server is gone
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

impl Drop for Session {
    fn drop(&mut self) {
        // Never let a timer outlive its session
        self.timer.cancel();
    }
}
