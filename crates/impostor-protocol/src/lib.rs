//! Wire protocol for the impostor server.
//!
//! This crate defines the vocabulary every other layer shares:
//!
//! - **Identities** ([`PlayerId`], [`RoomCode`]): who is acting, and on
//!   which room.
//! - **Envelopes** ([`Envelope`], [`Payload`], [`SystemMessage`]): the
//!   frame every message travels in. The game-level body is generic so
//!   the room layer's actions and events can ride inside it without this
//!   crate knowing about them.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become
//!   bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<T>) → Session (player) → Room
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Envelope, Payload, PlayerId, Recipient, RoomCode, SystemMessage};
