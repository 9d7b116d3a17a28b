//! Session records.

use std::time::{Duration, Instant};

use impostor_protocol::PlayerId;

/// Session behavior knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a dropped connection may come back with its token.
    /// Zero disables resumption.
    pub reconnect_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(120),
        }
    }
}

/// Lifecycle of one session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapsed)──→ Expired
///       ↑                            │
///       └────────(reconnect)─────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    /// Dropped at `since`; resumable until `since + grace`.
    Disconnected { since: Instant },
    /// Waiting for [`cleanup_expired`](crate::SessionManager::cleanup_expired).
    Expired,
}

/// The server's record of one player identity.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,
    pub state: SessionState,
    /// 32 hex characters (128 random bits), handed to the client in the
    /// welcome message.
    pub reconnect_token: String,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }
}
