//! Error types for the session layer.

use impostor_protocol::PlayerId;

/// Why a session operation was refused.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The resume token was never issued or has been cleaned up.
    #[error("invalid reconnection token")]
    InvalidToken,

    /// The grace period ran out before the player came back.
    #[error("session expired for player {0}")]
    SessionExpired(PlayerId),

    /// The player's session is still attached to a live connection.
    #[error("player {0} already has an active session")]
    AlreadyConnected(PlayerId),
}
