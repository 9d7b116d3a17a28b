//! Players and their display profile.

use std::time::{SystemTime, UNIX_EPOCH};

use impostor_protocol::PlayerId;
use serde::{Deserialize, Serialize};

/// Display information a player chooses for themself.
///
/// The room layer stores these verbatim. Length and charset limits are
/// the connection layer's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub nickname: String,
    #[serde(default = "Profile::default_icon")]
    pub profile_icon: String,
}

impl Profile {
    /// Creates a profile with the default icon.
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            profile_icon: Self::default_icon(),
        }
    }

    fn default_icon() -> String {
        "0.png".to_string()
    }
}

/// One seat in a room.
///
/// The four flags are independent. `is_impostor` is secret: it leaves the
/// room layer only through [`RoomView`](crate::RoomView), which redacts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub(crate) id: PlayerId,
    pub(crate) profile: Profile,
    pub(crate) is_host: bool,
    pub(crate) is_impostor: bool,
    pub(crate) is_connected: bool,
    pub(crate) is_eliminated: bool,
    pub(crate) joined_at: u64,
    pub(crate) last_seen: u64,
}

impl Player {
    pub(crate) fn new(id: PlayerId, profile: Profile, is_host: bool) -> Self {
        let now = unix_millis();
        Self {
            id,
            profile,
            is_host,
            is_impostor: false,
            is_connected: true,
            is_eliminated: false,
            joined_at: now,
            last_seen: now,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn nickname(&self) -> &str {
        &self.profile.nickname
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn is_impostor(&self) -> bool {
        self.is_impostor
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn is_eliminated(&self) -> bool {
        self.is_eliminated
    }

    /// Connected and not eliminated: may chat, vote, and be voted for.
    pub fn is_active(&self) -> bool {
        self.is_connected && !self.is_eliminated
    }

    /// Unix milliseconds when the seat was taken.
    pub fn joined_at(&self) -> u64 {
        self.joined_at
    }

    /// Unix milliseconds of the last join, reconnect, or disconnect.
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    pub(crate) fn mark_seen(&mut self) {
        self.last_seen = unix_millis();
    }
}

/// Wall-clock milliseconds since the Unix epoch, for client-facing timestamps.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
