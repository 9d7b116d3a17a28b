//! Game state machine: starting a game, opening voting, win evaluation,
//! and resetting back to the lobby.

use impostor_protocol::{PlayerId, RoomCode};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::{Phase, Player, Room, RoomError, RoomStore};

/// Which side won a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Innocents,
    Impostors,
}

impl Winner {
    /// A one-line explanation suitable for the room log.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Innocents => "All impostors have been eliminated",
            Self::Impostors => "The impostors equal or outnumber the remaining players",
        }
    }
}

/// Result of checking the win conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinState {
    Continuing,
    InnocentsWin,
    ImpostorsWin,
}

impl WinState {
    pub fn winner(self) -> Option<Winner> {
        match self {
            Self::Continuing => None,
            Self::InnocentsWin => Some(Winner::Innocents),
            Self::ImpostorsWin => Some(Winner::Impostors),
        }
    }
}

/// Checks the win conditions over the active players of a room.
///
/// Innocents win when no impostor is left; impostors win once they are
/// at least as many as everyone else.
pub fn evaluate_win<'a>(active: impl IntoIterator<Item = &'a Player>) -> WinState {
    let (impostors, innocents) = active
        .into_iter()
        .fold((0usize, 0usize), |(imp, inn), p| {
            if p.is_impostor { (imp + 1, inn) } else { (imp, inn + 1) }
        });

    if impostors == 0 {
        WinState::InnocentsWin
    } else if impostors >= innocents {
        WinState::ImpostorsWin
    } else {
        WinState::Continuing
    }
}

/// What one player privately learns when a game starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCard {
    pub is_impostor: bool,
    /// `None` for impostors.
    pub secret: Option<String>,
}

impl Room {
    /// The private role of `player` in the running or finished game.
    pub fn role_card(&self, player: PlayerId) -> Option<RoleCard> {
        if !(self.phase.is_in_game() || self.phase == Phase::Finished) {
            return None;
        }
        let seat = self.player(player)?;
        Some(RoleCard {
            is_impostor: seat.is_impostor,
            secret: if seat.is_impostor {
                None
            } else {
                self.secret.clone()
            },
        })
    }
}

impl RoomStore {
    /// Starts a game: draws the secret and the impostors, then opens
    /// discussion.
    ///
    /// Impostors are a uniform sample without replacement over the
    /// players connected right now. Nothing from a previous game
    /// influences the draw.
    pub fn start(&mut self, code: &RoomCode, host: PlayerId) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        room.require_host(host)?;
        room.require_phase(Phase::Waiting, "start the game")?;

        let connected: Vec<usize> = room
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_connected)
            .map(|(i, _)| i)
            .collect();
        if connected.len() < self.config.min_players_to_start {
            return Err(RoomError::InsufficientPlayers {
                required: self.config.min_players_to_start,
                connected: connected.len(),
            });
        }
        let impostors = room.settings.impostor_count;
        if impostors >= connected.len() {
            return Err(RoomError::CapacityMisconfigured {
                impostors,
                players: connected.len(),
            });
        }

        room.set_phase(Phase::Starting);
        room.secret = self.config.secrets.choose(&mut self.rng).cloned();
        room.selections.clear();
        room.voting_round = 0;
        room.game += 1;
        for player in &mut room.players {
            player.is_impostor = false;
            player.is_eliminated = false;
        }
        for pick in rand::seq::index::sample(&mut self.rng, connected.len(), impostors) {
            room.players[connected[pick]].is_impostor = true;
        }
        room.set_phase(Phase::Discussion);
        room.system_message("The game has started");
        room.touch();

        tracing::info!(room = %code, game = room.game, players = connected.len(), impostors, "game started");
        Ok(&*room)
    }

    /// Opens a new voting round. Returns the round number.
    pub fn start_voting(&mut self, code: &RoomCode) -> Result<u32, RoomError> {
        let room = self.room_mut(code)?;
        room.require_phase(Phase::Discussion, "start voting")?;

        room.voting_round += 1;
        let round = room.voting_round;
        room.selections.clear();
        room.set_phase(Phase::Voting);
        room.system_message(format!("Voting round {round} has started"));
        room.touch();

        tracing::info!(room = %code, round, "voting started");
        Ok(round)
    }

    /// Returns a room to the lobby. Host only, from any phase but
    /// [`Phase::Waiting`].
    ///
    /// Connected players and settings stay; disconnected seats are
    /// released and every role flag is cleared. The chat log is kept.
    pub fn reset(&mut self, code: &RoomCode, host: PlayerId) -> Result<&Room, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        room.require_host(host)?;
        if room.phase == Phase::Waiting {
            return Err(room.wrong_phase("reset the game"));
        }

        let dropped: Vec<PlayerId> = room
            .players
            .iter()
            .filter(|p| !p.is_connected)
            .map(|p| p.id)
            .collect();
        room.players.retain(|p| p.is_connected);
        for player in &mut room.players {
            player.is_impostor = false;
            player.is_eliminated = false;
        }
        room.secret = None;
        room.selections.clear();
        room.voting_round = 0;
        room.set_phase(Phase::Waiting);
        room.system_message("The game has been reset");
        room.touch();

        for id in &dropped {
            if self.player_rooms.get(id) == Some(code) {
                self.player_rooms.remove(id);
            }
        }
        tracing::info!(room = %code, dropped = dropped.len(), "game reset");
        Ok(&*room)
    }
}
