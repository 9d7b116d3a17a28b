//! The session manager: allocates player ids and tracks their connections.
//!
//! Not internally synchronized. The server keeps it behind its own mutex,
//! separate from the room store, and never holds both locks at once.

use std::collections::HashMap;
use std::time::Instant;

use impostor_protocol::PlayerId;
use rand::Rng;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Every live or recently dropped player identity.
///
/// ```text
/// open() ──→ [Connected] ──disconnect()──→ [Disconnected] ──reconnect()──→ [Connected]
///                                               │
///                                         expire_stale()
///                                               ▼
///                                          [Expired] ──cleanup_expired()──→ gone
/// ```
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,

    /// Token → owner, kept in sync with `sessions`.
    tokens: HashMap<String, PlayerId>,

    /// Ids are never reused, even after cleanup.
    next_id: u64,

    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            next_id: 1,
            config,
        }
    }

    /// Opens a session under a fresh player id.
    pub fn open(&mut self) -> &Session {
        let player_id = PlayerId(self.next_id);
        self.next_id += 1;

        let token = generate_token();
        self.tokens.insert(token.clone(), player_id);
        tracing::info!(%player_id, "session opened");

        self.sessions.entry(player_id).or_insert(Session {
            player_id,
            state: SessionState::Connected,
            reconnect_token: token,
        })
    }

    /// Marks a player's connection as gone and starts the grace period.
    pub fn disconnect(&mut self, player_id: PlayerId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;

        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };
        tracing::info!(%player_id, grace = ?self.config.reconnect_grace, "session disconnected");
        Ok(())
    }

    /// Resumes the session that issued `token`.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`]: unknown token
    /// - [`SessionError::SessionExpired`]: grace period elapsed
    /// - [`SessionError::AlreadyConnected`]: the owner is still online
    pub fn reconnect(&mut self, token: &str) -> Result<&Session, SessionError> {
        let player_id = self
            .tokens
            .get(token)
            .copied()
            .ok_or(SessionError::InvalidToken)?;
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::InvalidToken)?;

        match session.state {
            SessionState::Disconnected { since } => {
                if since.elapsed() >= self.config.reconnect_grace {
                    session.state = SessionState::Expired;
                    return Err(SessionError::SessionExpired(player_id));
                }
                session.state = SessionState::Connected;
                tracing::info!(%player_id, "session resumed");
                Ok(&*session)
            }
            SessionState::Connected => Err(SessionError::AlreadyConnected(player_id)),
            SessionState::Expired => Err(SessionError::SessionExpired(player_id)),
        }
    }

    /// Expires every disconnected session whose grace period ran out and
    /// returns their ids.
    pub fn expire_stale(&mut self) -> Vec<PlayerId> {
        let grace = self.config.reconnect_grace;
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = session.state {
                if since.elapsed() >= grace {
                    session.state = SessionState::Expired;
                    expired.push(session.player_id);
                }
            }
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "sessions expired");
        }
        expired
    }

    /// Drops expired sessions and their tokens.
    pub fn cleanup_expired(&mut self) {
        let tokens = &mut self.tokens;
        self.sessions.retain(|_, session| {
            if session.state == SessionState::Expired {
                tokens.remove(&session.reconnect_token);
                false
            } else {
                true
            }
        });
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Session> {
        self.sessions.get(&player_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// 16 random bytes as 32 lowercase hex characters.
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
