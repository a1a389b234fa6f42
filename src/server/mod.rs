//! WebSocket server module
//!
//! Accepts WebSocket connections and runs one echo-heartbeat session for each.

#[allow(dead_code)]
mod handler;
#[allow(dead_code)]
mod heartbeat;
#[allow(dead_code)]
mod protocol;
#[allow(dead_code)]
mod websocket;

#[allow(unused_imports)]
pub use handler::*;
#[allow(unused_imports)]
pub use heartbeat::*;
pub use protocol::*;
pub use websocket::*;
