//! Core protocol types for the impostor wire format.
//!
//! Everything here is plain data that crosses the network boundary. The
//! room layer never sees bytes; the transport layer never sees these
//! types. This module is the meeting point.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identity of a participant, assigned by the session layer and stable for
/// as long as the player keeps (or resumes) their session.
///
/// Serializes as a plain number: `PlayerId(42)` is `42` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The short, human-typeable code that addresses a room (e.g. `"K7Q2ZD"`).
///
/// Codes are always stored uppercase. Anything a client types is trimmed
/// and uppercased on the way in, so `" k7q2zd"` and `"K7Q2ZD"` name the
/// same room. Generation (length, alphabet, collision retry) belongs to
/// the room store, not to this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalizes and wraps a code.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who a server event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every connected player of the room.
    Room(RoomCode),

    /// A single player (the acting connection, or a private role card).
    Player(PlayerId),

    /// Every connected player of the room except one.
    RoomExcept(RoomCode, PlayerId),
}

// ---------------------------------------------------------------------------
// SystemMessage: connection plumbing, independent of the game
// ---------------------------------------------------------------------------

/// Messages the server and client exchange about the connection itself.
///
/// Internally tagged: `{ "type": "Hello", "version": 1, "resume_token": null }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server, first frame on every connection. A `resume_token`
    /// from an earlier `Welcome` asks to continue as the same player.
    Hello {
        version: u32,
        #[serde(default)]
        resume_token: Option<String>,
    },

    /// Server → Client: identity assigned (or resumed) and the token to
    /// present on the next connection.
    Welcome {
        player_id: PlayerId,
        resume_token: String,
        resumed: bool,
        server_time: u64,
    },

    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client keep-alive reply, echoing the client's clock.
    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Either direction: the sender is closing the connection.
    Disconnect { reason: String },

    /// Server → Client: an action was rejected. `code` follows HTTP
    /// conventions (400 bad input, 403 forbidden, 404 missing, 409 conflict).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Payload and Envelope
// ---------------------------------------------------------------------------

/// The content of an envelope: connection plumbing or a game-level body.
///
/// Adjacently tagged, so a game body `T` keeps its own tagging:
/// `{ "type": "Game", "data": { "type": "start-game" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload<T> {
    /// Handshake, heartbeat, errors.
    System(SystemMessage),

    /// A game action (client → server) or game event (server → client).
    Game(T),
}

/// The top-level frame. Every message on the wire is an `Envelope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Per-direction sequence number, starting at 0 for the handshake.
    pub seq: u64,

    /// Milliseconds since the sender started.
    #[serde(default)]
    pub timestamp: u64,

    /// The message content.
    pub payload: Payload<T>,
}

impl<T> Envelope<T> {
    /// Wraps a system message.
    pub fn system(seq: u64, timestamp: u64, msg: SystemMessage) -> Self {
        Self {
            seq,
            timestamp,
            payload: Payload::System(msg),
        }
    }

    /// Wraps a game body.
    pub fn game(seq: u64, timestamp: u64, body: T) -> Self {
        Self {
            seq,
            timestamp,
            payload: Payload::Game(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "kebab-case")]
    enum Body {
        StartGame,
        CastVote { target: PlayerId },
    }

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&PlayerId(42)).unwrap(), "42");
        let pid: PlayerId = serde_json::from_str("7").unwrap();
        assert_eq!(pid, PlayerId(7));
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_room_code_is_normalized() {
        assert_eq!(RoomCode::new(" k7q2zd ").as_str(), "K7Q2ZD");
        assert_eq!(RoomCode::from("abc123"), RoomCode::new("ABC123"));
    }

    #[test]
    fn test_room_code_deserialization_normalizes() {
        let code: RoomCode = serde_json::from_str("\"ab12cd\"").unwrap();
        assert_eq!(code.to_string(), "AB12CD");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"AB12CD\"");
    }

    #[test]
    fn test_hello_without_token_defaults_to_none() {
        let msg: SystemMessage =
            serde_json::from_str(r#"{"type":"Hello","version":1}"#).unwrap();
        assert_eq!(
            msg,
            SystemMessage::Hello {
                version: 1,
                resume_token: None
            }
        );
    }

    #[test]
    fn test_error_message_json_shape() {
        let json = serde_json::to_value(SystemMessage::Error {
            code: 404,
            message: "room ABCDEF not found".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["code"], 404);
    }

    #[test]
    fn test_game_payload_keeps_inner_tag() {
        let env = Envelope::game(3, 10, Body::CastVote { target: PlayerId(2) });
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["payload"]["type"], "Game");
        assert_eq!(json["payload"]["data"]["type"], "cast-vote");
        assert_eq!(json["payload"]["data"]["target"], 2);

        let back: Envelope<Body> = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn test_envelope_timestamp_is_optional() {
        let env: Envelope<Body> = serde_json::from_str(
            r#"{"seq":1,"payload":{"type":"Game","data":{"type":"start-game"}}}"#,
        )
        .unwrap();
        assert_eq!(env.timestamp, 0);
        assert_eq!(env.payload, Payload::Game(Body::StartGame));
    }
}
