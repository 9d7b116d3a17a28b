//! Codec trait and implementations for turning envelopes into bytes.
//!
//! The protocol layer does not care how frames are serialized; it needs
//! something implementing [`Codec`]. [`JsonCodec`] is the default because
//! browser clients can read it without extra tooling.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into an owned value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use impostor_protocol::{Codec, Envelope, JsonCodec, SystemMessage};
///
/// let codec = JsonCodec;
/// let env: Envelope<()> = Envelope::system(1, 5000, SystemMessage::Heartbeat { client_time: 5000 });
///
/// let bytes = codec.encode(&env).unwrap();
/// let decoded: Envelope<()> = codec.decode(&bytes).unwrap();
/// assert_eq!(env, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
