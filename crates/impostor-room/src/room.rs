//! The room record: one game session and everything it owns.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use impostor_protocol::{PlayerId, RoomCode};
use serde::{Deserialize, Serialize};

use crate::player::unix_millis;
use crate::{Phase, Player, RoomError, RoomSettings, RoundKey};

// ---------------------------------------------------------------------------
// Message log
// ---------------------------------------------------------------------------

/// Whether a log entry was typed by a player or written by the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    System,
}

/// One entry of a room's chat/system log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Per-room, strictly increasing.
    pub id: u64,
    /// `None` for system entries.
    pub author: Option<PlayerId>,
    pub author_nickname: String,
    pub content: String,
    /// Unix milliseconds.
    pub timestamp: u64,
    pub kind: MessageKind,
}

/// Bounded, insertion-ordered log. When full, the oldest entry is
/// dropped to make room for the newest.
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: VecDeque<ChatMessage>,
    capacity: usize,
    next_id: u64,
}

impl MessageLog {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    pub(crate) fn push(
        &mut self,
        author: Option<(PlayerId, &str)>,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> &ChatMessage {
        let (author, author_nickname) = match author {
            Some((id, nickname)) => (Some(id), nickname.to_string()),
            None => (None, "System".to_string()),
        };
        let message = ChatMessage {
            id: self.next_id,
            author,
            author_nickname,
            content: content.into(),
            timestamp: unix_millis(),
            kind,
        };
        self.next_id += 1;

        while self.entries.len() >= self.capacity.max(1) {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
        &self.entries[self.entries.len() - 1]
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<&ChatMessage> {
        self.entries.back()
    }
}

// ---------------------------------------------------------------------------
// Selections
// ---------------------------------------------------------------------------

/// A voter's tentative target in a voting round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Selection {
    pub(crate) target: PlayerId,
    pub(crate) round: u32,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A single game session, addressed by its [`RoomCode`].
///
/// All mutation goes through [`RoomStore`](crate::RoomStore), which
/// validates the caller and phase before touching anything here. The
/// accessors are read-only views for the connection layer and tests.
#[derive(Debug, Clone)]
pub struct Room {
    pub(crate) code: RoomCode,
    pub(crate) host_id: PlayerId,
    pub(crate) settings: RoomSettings,
    /// Join order. Iteration order is part of the contract (host promotion).
    pub(crate) players: Vec<Player>,
    pub(crate) phase: Phase,
    pub(crate) secret: Option<String>,
    pub(crate) messages: MessageLog,
    /// Keyed by voter, so a new selection replaces the old one.
    pub(crate) selections: HashMap<PlayerId, Selection>,
    pub(crate) voting_round: u32,
    /// Number of games started in this room. Never reset.
    pub(crate) game: u32,
    pub(crate) created_at: u64,
    pub(crate) last_activity: Instant,
}

impl Room {
    pub(crate) fn new(
        code: RoomCode,
        host: Player,
        settings: RoomSettings,
        message_capacity: usize,
    ) -> Self {
        Self {
            code,
            host_id: host.id,
            settings,
            players: vec![host],
            phase: Phase::Waiting,
            secret: None,
            messages: MessageLog::with_capacity(message_capacity),
            selections: HashMap::new(),
            voting_round: 0,
            game: 0,
            created_at: unix_millis(),
            last_activity: Instant::now(),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host_id(&self) -> PlayerId {
        self.host_id
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    /// All seats in join order, including disconnected and eliminated players.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The secret handed to non-impostors. Present from game start until reset.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    /// Incremented each time voting opens. 0 before the first vote.
    pub fn voting_round(&self) -> u32 {
        self.voting_round
    }

    /// Games started so far. Unlike the voting round, this survives a
    /// reset, so it tells two games of the same room apart.
    pub fn game(&self) -> u32 {
        self.game
    }

    /// The game and voting round the room is on right now.
    pub fn round_key(&self) -> RoundKey {
        RoundKey {
            game: self.game,
            round: self.voting_round,
        }
    }

    /// Unix milliseconds of creation.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Connected, non-eliminated players in join order.
    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_active())
    }

    /// Connected players in join order, eliminated or not.
    pub fn connected_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_connected)
    }

    pub fn connected_count(&self) -> usize {
        self.connected_players().count()
    }

    pub fn has_connected_players(&self) -> bool {
        self.players.iter().any(|p| p.is_connected)
    }

    /// The current round's target for `voter`, if they picked one.
    pub fn selection_of(&self, voter: PlayerId) -> Option<PlayerId> {
        self.selections
            .get(&voter)
            .filter(|s| s.round == self.voting_round)
            .map(|s| s.target)
    }

    /// `(voter, target)` pairs of the current round, in voter join order.
    pub fn current_selections(&self) -> Vec<(PlayerId, PlayerId)> {
        self.players
            .iter()
            .filter_map(|p| self.selection_of(p.id).map(|t| (p.id, t)))
            .collect()
    }

    // -- crate-internal mutation helpers -------------------------------------

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub(crate) fn set_phase(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {} -> {}",
            self.phase,
            next
        );
        tracing::debug!(room = %self.code, from = %self.phase, to = %next, "phase change");
        self.phase = next;
    }

    pub(crate) fn system_message(&mut self, content: impl Into<String>) {
        self.messages.push(None, content, MessageKind::System);
    }

    pub(crate) fn require_host(&self, caller: PlayerId) -> Result<(), RoomError> {
        if self.host_id == caller {
            Ok(())
        } else {
            Err(RoomError::NotHost(caller, self.code.clone()))
        }
    }

    pub(crate) fn require_phase(&self, expected: Phase, action: &'static str) -> Result<(), RoomError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(self.wrong_phase(action))
        }
    }

    pub(crate) fn wrong_phase(&self, action: &'static str) -> RoomError {
        RoomError::WrongPhase {
            room: self.code.clone(),
            phase: self.phase,
            action,
        }
    }

    /// Looks up an active player or explains why they cannot act.
    pub(crate) fn require_active(&self, id: PlayerId) -> Result<&Player, RoomError> {
        let player = self
            .player(id)
            .ok_or_else(|| RoomError::NotInRoom(id, self.code.clone()))?;
        if player.is_active() {
            Ok(player)
        } else {
            Err(RoomError::NotActive(id))
        }
    }

    pub(crate) fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        self.selections.remove(&id);
        Some(self.players.remove(index))
    }

    /// Restores "exactly one connected host" after a departure.
    ///
    /// Keeps the current host if still connected; otherwise promotes the
    /// first connected player in join order. Returns the new host when
    /// the role moved.
    pub(crate) fn ensure_host(&mut self) -> Option<PlayerId> {
        if self.player(self.host_id).is_some_and(|p| p.is_connected) {
            return None;
        }
        let next = self.players.iter().find(|p| p.is_connected).map(|p| p.id)?;
        for player in &mut self.players {
            player.is_host = player.id == next;
        }
        self.host_id = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Profile;

    fn room_with(ids: &[u64]) -> Room {
        let host = Player::new(PlayerId(ids[0]), Profile::new("host"), true);
        let mut room = Room::new(RoomCode::new("TEST01"), host, RoomSettings::default(), 100);
        for id in &ids[1..] {
            room.players
                .push(Player::new(PlayerId(*id), Profile::new(format!("p{id}")), false));
        }
        room
    }

    #[test]
    fn test_message_log_drops_oldest_when_full() {
        let mut log = MessageLog::with_capacity(3);
        for i in 1..=4 {
            log.push(None, format!("m{i}"), MessageKind::System);
        }

        let contents: Vec<&str> = log.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m2", "m3", "m4"]);
        assert_eq!(log.latest().map(|m| m.id), Some(4));
    }

    #[test]
    fn test_message_log_ids_keep_increasing_after_eviction() {
        let mut log = MessageLog::with_capacity(2);
        let ids: Vec<u64> = (0..5)
            .map(|i| log.push(Some((PlayerId(1), "a")), format!("{i}"), MessageKind::Chat).id)
            .collect();
        assert_eq!(ids, [1, 2, 3, 4, 5]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_ensure_host_keeps_connected_host() {
        let mut room = room_with(&[1, 2, 3]);
        assert_eq!(room.ensure_host(), None);
        assert_eq!(room.host_id(), PlayerId(1));
    }

    #[test]
    fn test_ensure_host_promotes_first_connected_by_join_order() {
        let mut room = room_with(&[1, 2, 3]);
        room.player_mut(PlayerId(1)).unwrap().is_connected = false;
        room.player_mut(PlayerId(2)).unwrap().is_connected = false;

        assert_eq!(room.ensure_host(), Some(PlayerId(3)));
        let hosts: Vec<PlayerId> = room.players().iter().filter(|p| p.is_host()).map(|p| p.id()).collect();
        assert_eq!(hosts, [PlayerId(3)]);
    }

    #[test]
    fn test_selection_of_ignores_previous_rounds() {
        let mut room = room_with(&[1, 2, 3]);
        room.voting_round = 2;
        room.selections.insert(PlayerId(1), Selection { target: PlayerId(2), round: 1 });
        room.selections.insert(PlayerId(3), Selection { target: PlayerId(2), round: 2 });

        assert_eq!(room.selection_of(PlayerId(1)), None);
        assert_eq!(room.current_selections(), [(PlayerId(3), PlayerId(2))]);
    }
}
