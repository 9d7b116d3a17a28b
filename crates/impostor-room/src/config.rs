//! Room settings, store configuration, and the phase state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RoomError;

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// Host-controlled settings of a single room.
///
/// Mutable only while the room is in [`Phase::Waiting`]. The impostor
/// count is checked against the number of connected players again at
/// game start, since players can leave after the settings were accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    /// Seats in the room, including soft-disconnected players.
    pub max_players: usize,

    /// Impostors drawn at game start.
    pub impostor_count: usize,

    /// Suggested discussion length in minutes. Displayed only.
    pub discussion_time: Option<u32>,

    /// Suggested voting length in minutes. Displayed only.
    pub voting_time: Option<u32>,

    /// Keep a departing player's seat during a game so they can resume.
    pub allow_reconnect: bool,

    /// Show who selected whom while voting is still open.
    pub reveal_votes_immediately: bool,

    /// Whether a player may select themself as a voting target.
    pub allow_self_vote: bool,
}

impl RoomSettings {
    /// Smallest accepted `max_players`.
    pub const MIN_SEATS: usize = 3;
    /// Largest accepted `max_players`.
    pub const MAX_SEATS: usize = 10;
    /// Smallest accepted `impostor_count`.
    pub const MIN_IMPOSTORS: usize = 1;
    /// Largest accepted `impostor_count`.
    pub const MAX_IMPOSTORS: usize = 3;

    /// Returns a copy with every field present in `patch` replaced.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        Self {
            max_players: patch.max_players.unwrap_or(self.max_players),
            impostor_count: patch.impostor_count.unwrap_or(self.impostor_count),
            discussion_time: patch.discussion_time.unwrap_or(self.discussion_time),
            voting_time: patch.voting_time.unwrap_or(self.voting_time),
            allow_reconnect: patch.allow_reconnect.unwrap_or(self.allow_reconnect),
            reveal_votes_immediately: patch
                .reveal_votes_immediately
                .unwrap_or(self.reveal_votes_immediately),
            allow_self_vote: patch.allow_self_vote.unwrap_or(self.allow_self_vote),
        }
    }

    /// Checks the bounded ranges and that the room still fits its
    /// `occupied` seats.
    pub fn validate(&self, occupied: usize) -> Result<(), RoomError> {
        if !(Self::MIN_SEATS..=Self::MAX_SEATS).contains(&self.max_players) {
            return Err(RoomError::InvalidSettings(format!(
                "max_players must be between {} and {}, got {}",
                Self::MIN_SEATS,
                Self::MAX_SEATS,
                self.max_players
            )));
        }
        if !(Self::MIN_IMPOSTORS..=Self::MAX_IMPOSTORS).contains(&self.impostor_count) {
            return Err(RoomError::InvalidSettings(format!(
                "impostor_count must be between {} and {}, got {}",
                Self::MIN_IMPOSTORS,
                Self::MAX_IMPOSTORS,
                self.impostor_count
            )));
        }
        if self.impostor_count >= self.max_players {
            return Err(RoomError::CapacityMisconfigured {
                impostors: self.impostor_count,
                players: self.max_players,
            });
        }
        if self.max_players < occupied {
            return Err(RoomError::InvalidSettings(format!(
                "max_players {} is below the {occupied} seats already taken",
                self.max_players
            )));
        }
        Ok(())
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_players: 6,
            impostor_count: 1,
            discussion_time: None,
            voting_time: None,
            allow_reconnect: true,
            reveal_votes_immediately: true,
            allow_self_vote: false,
        }
    }
}

/// A partial [`RoomSettings`] update. Absent fields are left untouched.
///
/// The timers are doubly optional so a patch can clear them:
/// `"discussion_time": null` sets no timer, a missing key keeps the old one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub max_players: Option<usize>,
    pub impostor_count: Option<usize>,
    #[serde(with = "double_option", skip_serializing_if = "Option::is_none")]
    pub discussion_time: Option<Option<u32>>,
    #[serde(with = "double_option", skip_serializing_if = "Option::is_none")]
    pub voting_time: Option<Option<u32>>,
    pub allow_reconnect: Option<bool>,
    pub reveal_votes_immediately: Option<bool>,
    pub allow_self_vote: Option<bool>,
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Option<u32>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<u32>>, D::Error> {
        Option::<u32>::deserialize(d).map(Some)
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Process-wide configuration of the [`RoomStore`](crate::RoomStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Characters in a generated room code.
    pub code_length: usize,

    /// Alphabet room codes are drawn from.
    pub code_alphabet: String,

    /// Connected players required to start a game.
    pub min_players_to_start: usize,

    /// Entries kept in a room's chat/system log.
    pub message_capacity: usize,

    /// Rooms untouched for longer than this are swept.
    pub idle_timeout: Duration,

    /// Pool the per-game secret is drawn from.
    pub secrets: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            code_alphabet: "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string(),
            min_players_to_start: 3,
            message_capacity: 100,
            idle_timeout: Duration::from_secs(24 * 60 * 60),
            secrets: DEFAULT_SECRETS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

const DEFAULT_SECRETS: &[&str] = &[
    "Ahri", "Akali", "Annie", "Ashe", "Braum", "Caitlyn", "Darius", "Ekko", "Ezreal",
    "Garen", "Jinx", "Karma", "Katarina", "Leona", "Lux", "Malphite", "Morgana", "Nami",
    "Orianna", "Pyke", "Renekton", "Riven", "Sett", "Sona", "Teemo", "Thresh", "Vi",
    "Yasuo", "Yone", "Zed",
];

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The stage a room's game is in.
///
/// ```text
/// Waiting → Starting → Discussion ⇄ Voting → Reveal → Discussion | Finished
///                                                         Finished → Waiting (reset)
/// ```
///
/// - **Waiting**: lobby. Joins, kicks, and settings changes are allowed.
/// - **Starting**: roles are being drawn. Only exists inside `start`.
/// - **Discussion**: players talk; any player may open voting.
/// - **Voting**: players select targets; the host finalizes.
/// - **Reveal**: selections are frozen while the countdown runs.
/// - **Finished**: one side won. Terminal until the host resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Waiting,
    Starting,
    Discussion,
    Voting,
    Reveal,
    Finished,
}

impl Phase {
    /// Returns `true` if brand-new players may join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` while roles are assigned and the game is undecided.
    pub fn is_in_game(self) -> bool {
        matches!(self, Self::Starting | Self::Discussion | Self::Voting | Self::Reveal)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    ///
    /// Reset (`* → Waiting`) is deliberately included for every phase
    /// but `Waiting` itself.
    pub fn can_transition_to(self, target: Self) -> bool {
        use Phase::*;
        matches!(
            (self, target),
            (Waiting, Starting)
                | (Starting, Discussion)
                | (Discussion, Voting)
                | (Voting, Reveal)
                | (Reveal, Discussion)
                | (Reveal, Finished)
                | (Starting | Discussion | Voting | Reveal | Finished, Waiting)
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Waiting => "WAITING",
            Self::Starting => "STARTING",
            Self::Discussion => "DISCUSSION",
            Self::Voting => "VOTING",
            Self::Reveal => "REVEAL",
            Self::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}
