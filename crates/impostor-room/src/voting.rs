//! Voting engine: tentative selections, host finalization, tally,
//! tie-break, and elimination.
//!
//! A round runs in two steps. While the room is in
//! [`Phase::Voting`], active players set or clear a tentative target as
//! often as they like. The host then finalizes, which moves the room to
//! [`Phase::Reveal`] and freezes the selections. After the cosmetic
//! countdown the caller runs [`RoomStore::process_votes`] with the
//! [`RoundKey`] it finalized; a room that moved on in the meantime refuses
//! with [`RoomError::StaleRound`] or [`RoomError::WrongPhase`].

use std::fmt;

use impostor_protocol::{PlayerId, RoomCode};
use serde::{Deserialize, Serialize};

use crate::game::{Winner, evaluate_win};
use crate::room::Selection;
use crate::{Phase, RoomError, RoomStore};

/// One voting round of one game.
///
/// The round number restarts with every game, so a key from before a
/// reset can carry the same number as a round of the next game. The game
/// number tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundKey {
    pub game: u32,
    pub round: u32,
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game {} round {}", self.game, self.round)
    }
}

/// Where the current round stands after a selection changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionProgress {
    pub round: u32,
    /// Active players that currently have a target.
    pub selections: usize,
    /// Active players, i.e. everyone who may select.
    pub eligible: usize,
    /// Everyone eligible has a target.
    pub ready_to_finalize: bool,
}

/// Per-candidate vote counts of one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Every candidate in input order, including those with zero votes.
    pub counts: Vec<(PlayerId, usize)>,
    /// Highest count reached.
    pub max: usize,
    /// Candidates that reached `max`.
    pub leaders: Vec<PlayerId>,
}

impl Tally {
    /// More than one leader, or nobody voted at all.
    pub fn is_tie(&self) -> bool {
        self.max == 0 || self.leaders.len() != 1
    }

    /// The unique leader, unless the round is tied.
    pub fn eliminated(&self) -> Option<PlayerId> {
        if self.is_tie() {
            None
        } else {
            self.leaders.first().copied()
        }
    }
}

/// Counts `ballots` (`(voter, target)` pairs) over `candidates`.
///
/// Candidates nobody voted for still appear with zero. Ballots naming a
/// non-candidate are ignored.
pub fn tally(candidates: &[PlayerId], ballots: &[(PlayerId, PlayerId)]) -> Tally {
    let counts: Vec<(PlayerId, usize)> = candidates
        .iter()
        .map(|&c| (c, ballots.iter().filter(|(_, target)| *target == c).count()))
        .collect();
    let max = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let leaders = counts
        .iter()
        .filter(|(_, n)| *n == max)
        .map(|(id, _)| *id)
        .collect();

    Tally { counts, max, leaders }
}

/// Everything that came out of processing a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingOutcome {
    pub round: u32,
    /// The `(voter, target)` pairs that were counted.
    pub ballots: Vec<(PlayerId, PlayerId)>,
    /// Every active player with the votes they received, in join order.
    pub counts: Vec<(PlayerId, usize)>,
    pub eliminated: Option<PlayerId>,
    pub is_tie: bool,
    /// The game goes on and a new round follows the next discussion.
    pub new_round: bool,
    pub winner: Option<Winner>,
}

impl RoomStore {
    /// Sets (`Some`) or clears (`None`) `voter`'s tentative target.
    ///
    /// A new selection replaces the previous one of the same round.
    pub fn select_vote(
        &mut self,
        code: &RoomCode,
        voter: PlayerId,
        target: Option<PlayerId>,
    ) -> Result<SelectionProgress, RoomError> {
        let room = self.room_mut(code)?;
        room.require_phase(Phase::Voting, "select a vote")?;
        room.require_active(voter)?;

        let round = room.voting_round;
        match target {
            Some(target) => {
                if target == voter && !room.settings.allow_self_vote {
                    return Err(RoomError::InvalidTarget(target));
                }
                if !room.player(target).is_some_and(|p| p.is_active()) {
                    return Err(RoomError::InvalidTarget(target));
                }
                room.selections.insert(voter, Selection { target, round });
            }
            None => {
                room.selections.remove(&voter);
            }
        }
        room.touch();

        let room = &*room;
        let eligible = room.active_players().count();
        let selections = room
            .active_players()
            .filter(|p| room.selection_of(p.id).is_some())
            .count();
        tracing::debug!(room = %code, round, selections, eligible, "selection updated");

        Ok(SelectionProgress {
            round,
            selections,
            eligible,
            ready_to_finalize: eligible > 0 && selections == eligible,
        })
    }

    /// Closes selection for the current round and enters the reveal.
    /// Host only. Returns the key to hand back to [`Self::process_votes`].
    pub fn finalize_voting(&mut self, code: &RoomCode, host: PlayerId) -> Result<RoundKey, RoomError> {
        let room = self.room_mut(code)?;
        room.require_host(host)?;
        room.require_phase(Phase::Voting, "finalize voting")?;

        room.set_phase(Phase::Reveal);
        room.touch();
        let key = room.round_key();
        tracing::info!(room = %code, %key, "voting finalized");
        Ok(key)
    }

    /// Tallies the frozen selections of the round `key` names and applies
    /// the result.
    ///
    /// Only selections whose voter and target are both still active
    /// count. A unique leader is eliminated and the win conditions are
    /// checked; a tie eliminates nobody. Either way the room leaves
    /// [`Phase::Reveal`] for discussion or, on a win, [`Phase::Finished`].
    pub fn process_votes(&mut self, code: &RoomCode, key: RoundKey) -> Result<VotingOutcome, RoomError> {
        let room = self.room_mut(code)?;
        if room.phase != Phase::Reveal {
            return Err(room.wrong_phase("process votes"));
        }
        let current = room.round_key();
        if current != key {
            return Err(RoomError::StaleRound { expected: key, current });
        }
        let round = key.round;

        let candidates: Vec<PlayerId> = room.active_players().map(|p| p.id).collect();
        let ballots: Vec<(PlayerId, PlayerId)> = room
            .current_selections()
            .into_iter()
            .filter(|(voter, target)| candidates.contains(voter) && candidates.contains(target))
            .collect();
        let result = tally(&candidates, &ballots);
        room.selections.clear();

        let eliminated = result.eliminated();
        let mut winner = None;
        match eliminated {
            Some(target) => {
                let mut nickname = String::new();
                if let Some(seat) = room.player_mut(target) {
                    seat.is_eliminated = true;
                    nickname = seat.profile.nickname.clone();
                }
                room.system_message(format!("{nickname} was eliminated"));
                winner = evaluate_win(room.active_players()).winner();
            }
            None => room.system_message("Tie vote! No one was eliminated"),
        }

        match winner {
            Some(side) => {
                room.set_phase(Phase::Finished);
                room.system_message(format!("Game over: {}", side.reason()));
                tracing::info!(room = %code, round, winner = ?side, "game finished");
            }
            None => room.set_phase(Phase::Discussion),
        }
        room.touch();

        tracing::info!(room = %code, round, tie = result.is_tie(), "votes processed");
        Ok(VotingOutcome {
            round,
            ballots,
            counts: result.counts,
            eliminated,
            is_tie: eliminated.is_none(),
            new_round: winner.is_none(),
            winner,
        })
    }
}
