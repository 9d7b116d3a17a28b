//! Game-level message bodies carried in `Payload::Game`.
//!
//! Tags are kebab-case, matching the event names browser clients already
//! listen for: `{"type": "select-vote", "target": 4}`.

use impostor_protocol::{PlayerId, RoomCode};
use impostor_room::{
    ChatMessage, Departure, Profile, RoleCard, RoomSettings, RoomView, SelectionProgress,
    SettingsPatch, VotingOutcome, Winner,
};
use serde::{Deserialize, Serialize};

/// Client → Server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientAction {
    CreateRoom {
        profile: Profile,
        #[serde(default)]
        settings: SettingsPatch,
    },
    JoinRoom {
        code: RoomCode,
        profile: Profile,
    },
    LeaveRoom,
    KickPlayer {
        target: PlayerId,
    },
    UpdateSettings {
        settings: SettingsPatch,
    },
    StartGame,
    SendMessage {
        content: String,
    },
    StartVoting,
    /// `None` clears the current selection.
    SelectVote {
        #[serde(default)]
        target: Option<PlayerId>,
    },
    FinalizeVoting,
    ResetGame,
}

impl ClientAction {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create-room",
            Self::JoinRoom { .. } => "join-room",
            Self::LeaveRoom => "leave-room",
            Self::KickPlayer { .. } => "kick-player",
            Self::UpdateSettings { .. } => "update-settings",
            Self::StartGame => "start-game",
            Self::SendMessage { .. } => "send-message",
            Self::StartVoting => "start-voting",
            Self::SelectVote { .. } => "select-vote",
            Self::FinalizeVoting => "finalize-voting",
            Self::ResetGame => "reset-game",
        }
    }
}

/// Server → Client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// To the creator only.
    RoomCreated { code: RoomCode, view: RoomView },
    /// To the joining player only.
    RoomJoined { code: RoomCode, view: RoomView },
    /// The recipient's own redacted view after any change.
    RoomUpdated { view: RoomView },
    PlayerJoined { player_id: PlayerId, nickname: String },
    PlayerLeft {
        player_id: PlayerId,
        departure: Departure,
        new_host: Option<PlayerId>,
    },
    /// Sent to the room and to the kicked player.
    PlayerKicked { player_id: PlayerId },
    SettingsUpdated { settings: RoomSettings },
    /// Private to each recipient.
    GameStarted { role: RoleCard },
    MessageReceived { message: ChatMessage },
    VotingStarted { round: u32 },
    VoteSelectionUpdated { progress: SelectionProgress },
    /// To the host once every active player has a selection.
    VotingReadyToFinalize { round: u32 },
    VotingCountdown { round: u32, remaining: u32 },
    VotingResults { outcome: VotingOutcome },
    GameEnded { winner: Winner, reason: String },
    GameReset,
    /// To the acting player only: their leave was processed.
    LeftRoom { code: RoomCode },
}
