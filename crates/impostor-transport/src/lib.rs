//! Transport layer for the impostor server.
//!
//! [`Transport`] accepts connections; [`Connection`] moves whole frames in
//! both directions. The rest of the server only sees these traits and
//! raw bytes.
//!
//! A connection is read by one task and written by another (the handler
//! reads actions while a writer drains the player's outbox), so
//! implementations must let `send` and `recv` run concurrently.
//!
//! # Feature flags
//!
//! - `websocket` (default): [`WebSocketTransport`] via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier of one accepted connection. Unrelated to player ids:
/// a player who reconnects gets a new `ConnectionId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts incoming connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next connection and completes its upgrade.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// One bidirectional, message-framed connection.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame. UTF-8 payloads go out as text frames.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame. `Ok(None)` means the peer closed cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts a clean close.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_round_trips_inner_value() {
        assert_eq!(ConnectionId::new(42).into_inner(), 42);
        assert_ne!(ConnectionId::new(1), ConnectionId::new(2));
    }
}
