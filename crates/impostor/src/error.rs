//! Unified error type for the impostor server.

use impostor_protocol::{PlayerId, ProtocolError};
use impostor_room::RoomError;
use impostor_session::SessionError;
use impostor_transport::TransportError;

use crate::ConfigError;

/// Wraps every layer's error so `?` works across crate boundaries.
#[derive(Debug, thiserror::Error)]
pub enum ImpostorError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A room action arrived from a connection that has not joined one.
    #[error("player {0} is not in a room")]
    NoRoom(PlayerId),
}

impl ImpostorError {
    /// Status code sent to the client in a `SystemMessage::Error`.
    pub fn status(&self) -> u16 {
        match self {
            Self::Room(e) => e.status(),
            Self::NoRoom(_) => 404,
            Self::Session(SessionError::InvalidToken | SessionError::SessionExpired(_)) => 401,
            Self::Session(SessionError::AlreadyConnected(_)) => 409,
            Self::Protocol(_) => 400,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use impostor_protocol::RoomCode;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: ImpostorError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, ImpostorError::Transport(_)));
        assert!(err.to_string().contains("gone"));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_from_room_error_keeps_its_status() {
        let err: ImpostorError = RoomError::NotFound(RoomCode::new("abc123")).into();
        assert!(matches!(err, ImpostorError::Room(_)));
        assert_eq!(err.status(), 404);
        assert_eq!(err.to_string(), "room ABC123 not found");
    }

    #[test]
    fn test_session_errors_map_to_auth_statuses() {
        let expired: ImpostorError = SessionError::SessionExpired(PlayerId(3)).into();
        assert_eq!(expired.status(), 401);
        let taken: ImpostorError = SessionError::AlreadyConnected(PlayerId(3)).into();
        assert_eq!(taken.status(), 409);
    }

    #[test]
    fn test_from_protocol_error() {
        let err: ImpostorError = ProtocolError::InvalidMessage("bad".into()).into();
        assert_eq!(err.status(), 400);
    }
}
