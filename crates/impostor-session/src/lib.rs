//! Connection identity for the impostor server.
//!
//! The room core trusts whatever [`PlayerId`](impostor_protocol::PlayerId)
//! it is handed. This crate is where those identities come from:
//!
//! 1. **Allocation**: every new connection gets a fresh, never reused id
//!    ([`SessionManager::open`])
//! 2. **Resumption**: the client keeps a secret token and presents it on
//!    its next connection to get the same id back
//!    ([`SessionManager::reconnect`])
//! 3. **Expiry**: a token only works for a grace period after the
//!    connection dropped ([`SessionManager::expire_stale`])
//!
//! There is no authentication. A token proves "I am the connection that
//! held this id a moment ago", nothing more.

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};
