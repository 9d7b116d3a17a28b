//! Error types for the room layer.

use impostor_protocol::{PlayerId, RoomCode};

use crate::{Phase, RoundKey};

/// Why a room operation was refused.
///
/// Every variant is a normal, expected outcome of a client asking for
/// something it may not do. None of them leave the room half-mutated:
/// operations validate first and mutate after.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The caller is not the room's host.
    #[error("player {0} is not the host of room {1}")]
    NotHost(PlayerId, RoomCode),

    /// The operation is not allowed in the room's current phase.
    #[error("cannot {action} in room {room} during {phase}")]
    WrongPhase {
        room: RoomCode,
        phase: Phase,
        action: &'static str,
    },

    /// Every seat is taken.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// Not enough players for the configured number of impostors.
    #[error("{impostors} impostor(s) need more than {players} player(s)")]
    CapacityMisconfigured { impostors: usize, players: usize },

    /// Too few connected players to start a game.
    #[error("need at least {required} connected players, have {connected}")]
    InsufficientPlayers { required: usize, connected: usize },

    /// The named player cannot be targeted (absent, inactive, self, or host).
    #[error("invalid target {0}")]
    InvalidTarget(PlayerId),

    /// The player has no seat in this room.
    #[error("player {0} is not in room {1}")]
    NotInRoom(PlayerId, RoomCode),

    /// The player is disconnected or eliminated and cannot act.
    #[error("player {0} is not an active player")]
    NotActive(PlayerId),

    /// The player already occupies a seat (in this or another room).
    #[error("player {0} is already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    /// A settings value is outside its accepted range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A deferred action refers to a voting round that is over, possibly
    /// one from an earlier game.
    #[error("{expected} is stale (room is on {current})")]
    StaleRound { expected: RoundKey, current: RoundKey },

    /// No unused room code could be drawn: the code space is full or the
    /// store's code alphabet is empty.
    #[error("no free room code after {attempts} attempts")]
    NoFreeCode { attempts: usize },
}

impl RoomError {
    /// HTTP-style status code for reporting the failure to a client.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::NotInRoom(..) => 404,
            Self::NotHost(..) | Self::NotActive(_) => 403,
            Self::WrongPhase { .. }
            | Self::RoomFull(_)
            | Self::AlreadyInRoom(..)
            | Self::StaleRound { .. } => 409,
            Self::CapacityMisconfigured { .. }
            | Self::InsufficientPlayers { .. }
            | Self::InvalidTarget(_)
            | Self::InvalidSettings(_) => 400,
            Self::NoFreeCode { .. } => 503,
        }
    }
}
