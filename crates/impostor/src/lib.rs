//! # Impostor
//!
//! WebSocket server for a social-deduction party game: players gather in a
//! room, one or more of them are secretly impostors, everyone else shares
//! a secret word, and the room votes players out until one side wins.
//!
//! The game rules live in [`impostor_room`]. This crate connects them to
//! the network: it assigns player identities, decodes [`ClientAction`]s,
//! runs them against the shared [`RoomStore`](impostor_room::RoomStore),
//! and fans the resulting [`ServerEvent`]s out to the right players. It
//! also drives the reveal countdown after each vote and sweeps idle rooms.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use impostor::prelude::*;
//!
//! # async fn run() -> Result<(), ImpostorError> {
//! let server = ImpostorServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod countdown;
mod dispatch;
mod error;
mod handler;
mod messages;
mod server;
mod sweeper;

pub use config::{ConfigError, ServerConfig};
pub use error::ImpostorError;
pub use messages::{ClientAction, ServerEvent};
pub use server::{ImpostorServer, ImpostorServerBuilder, PROTOCOL_VERSION};

/// Everything needed to run a server or write a client against it.
pub mod prelude {
    pub use crate::{
        ClientAction, ConfigError, ImpostorError, ImpostorServer, ImpostorServerBuilder,
        PROTOCOL_VERSION, ServerConfig, ServerEvent,
    };
    pub use impostor_protocol::{Codec, Envelope, JsonCodec, Payload, PlayerId, RoomCode, SystemMessage};
    pub use impostor_room::{
        Phase, Profile, RoleCard, RoomSettings, RoomView, SettingsPatch, StoreConfig, VotingOutcome,
        Winner,
    };
    pub use impostor_session::SessionConfig;
    pub use impostor_tick::CountdownConfig;
}
