//! Player-scoped snapshots of a room.
//!
//! A [`Room`] holds secrets (who the impostors are, the secret payload,
//! possibly who selected whom). Nothing leaves the room layer as a raw
//! `Room`: callers build a [`RoomView`] per recipient, which redacts what
//! that recipient may not know yet.

use impostor_protocol::{PlayerId, RoomCode};
use serde::{Deserialize, Serialize};

use crate::{ChatMessage, Phase, Player, Room, RoomSettings};

/// One seat as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub nickname: String,
    pub profile_icon: String,
    pub is_host: bool,
    pub is_connected: bool,
    pub is_eliminated: bool,
    /// Known only for the viewer's own seat, and for everyone once the
    /// game is finished.
    pub is_impostor: Option<bool>,
    /// Has a target in the current voting round.
    pub has_selected: bool,
    /// The target itself, shown only when the room reveals votes as they come.
    pub selected: Option<PlayerId>,
}

/// The room as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub phase: Phase,
    pub settings: RoomSettings,
    pub players: Vec<PlayerView>,
    pub secret: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub voting_round: u32,
    pub created_at: u64,
}

impl Room {
    /// Builds the snapshot `viewer` is allowed to see.
    ///
    /// `viewer` need not be seated; a stranger gets the public view.
    pub fn view_for(&self, viewer: PlayerId) -> RoomView {
        let finished = self.phase == Phase::Finished;
        let viewer_is_impostor = self.player(viewer).map(Player::is_impostor);
        let voting = matches!(self.phase, Phase::Voting | Phase::Reveal);

        let players = self
            .players
            .iter()
            .map(|p| {
                let selection = if voting { self.selection_of(p.id) } else { None };
                PlayerView {
                    id: p.id,
                    nickname: p.profile.nickname.clone(),
                    profile_icon: p.profile.profile_icon.clone(),
                    is_host: p.is_host,
                    is_connected: p.is_connected,
                    is_eliminated: p.is_eliminated,
                    is_impostor: (finished || p.id == viewer).then_some(p.is_impostor),
                    has_selected: selection.is_some(),
                    selected: selection.filter(|_| self.settings.reveal_votes_immediately),
                }
            })
            .collect();

        let secret = match self.phase {
            Phase::Finished => self.secret.clone(),
            phase if phase.is_in_game() && viewer_is_impostor == Some(false) => self.secret.clone(),
            _ => None,
        };

        RoomView {
            code: self.code.clone(),
            host_id: self.host_id,
            phase: self.phase,
            settings: self.settings.clone(),
            players,
            secret,
            messages: self.messages.iter().cloned().collect(),
            voting_round: self.voting_round,
            created_at: self.created_at,
        }
    }
}
