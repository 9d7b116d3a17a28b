//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, or an
    /// unknown message tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded fine but breaks a protocol rule, e.g. a game
    /// action sent before the `Hello` handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
