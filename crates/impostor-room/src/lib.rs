//! Rooms, games, and votes for the impostor server.
//!
//! This crate is the authoritative game core. It owns no sockets and no
//! timers: every operation takes the acting player's identity, mutates a
//! room held by the [`RoomStore`], and returns plain data for the caller to
//! fan out.
//!
//! # Key types
//!
//! - [`RoomStore`]: creates, looks up, and sweeps rooms; every operation
//!   lives here
//! - [`Room`]: one game session (players, phase, chat, selections)
//! - [`Phase`]: the game state machine
//! - [`RoomView`]: what one player is allowed to see of a room
//! - [`RoomError`]: why an operation was refused
//!
//! # A round, end to end
//!
//! ```
//! use impostor_protocol::PlayerId;
//! use impostor_room::{Phase, Profile, RoomStore, SettingsPatch, StoreConfig};
//!
//! let mut store = RoomStore::new(StoreConfig::default());
//! let code = store
//!     .create(PlayerId(1), Profile::new("ana"), &SettingsPatch::default())?
//!     .code()
//!     .clone();
//! store.join(&code, PlayerId(2), Profile::new("bo"))?;
//! store.join(&code, PlayerId(3), Profile::new("cy"))?;
//!
//! store.start(&code, PlayerId(1))?;
//! store.start_voting(&code)?;
//! store.select_vote(&code, PlayerId(1), Some(PlayerId(2)))?;
//! let round = store.finalize_voting(&code, PlayerId(1))?;
//! let outcome = store.process_votes(&code, round)?;
//!
//! assert_eq!(outcome.eliminated, Some(PlayerId(2)));
//! assert_ne!(store.get(&code)?.phase(), Phase::Voting);
//! # Ok::<(), impostor_room::RoomError>(())
//! ```

mod chat;
mod config;
mod error;
mod game;
mod lifecycle;
mod player;
mod room;
mod store;
mod view;
mod voting;

pub use config::{Phase, RoomSettings, SettingsPatch, StoreConfig};
pub use error::RoomError;
pub use game::{RoleCard, WinState, Winner, evaluate_win};
pub use lifecycle::{Departure, LeaveOutcome};
pub use player::{Player, Profile};
pub use room::{ChatMessage, MessageKind, MessageLog, Room};
pub use store::{HealthReport, RoomStore};
pub use view::{PlayerView, RoomView};
pub use voting::{RoundKey, SelectionProgress, Tally, VotingOutcome, tally};
