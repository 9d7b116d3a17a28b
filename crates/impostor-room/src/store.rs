//! Room store: owns every live room and the player → room index.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use impostor_protocol::{PlayerId, RoomCode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::{Player, Profile, Room, RoomError, SettingsPatch, StoreConfig};

/// Draws tried before [`RoomStore::create`] gives up on finding a free code.
const MAX_CODE_ATTEMPTS: usize = 64;

/// Aggregate numbers for health and metrics collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub active_rooms: usize,
    pub connected_players: usize,
}

/// Owns every live [`Room`] and which room each player currently sits in.
///
/// The store is plain data with `&mut self` methods; it is NOT internally
/// synchronized. The owner decides the discipline: the server wraps it in
/// a single mutex so that every action, countdown tick, and idle sweep
/// runs as one uninterrupted unit against the store.
///
/// Operations are split across modules by concern:
/// - lifecycle (`join`, `leave`, `kick`, `update_settings`)
/// - game (`start`, `start_voting`, `reset`)
/// - voting (`select_vote`, `finalize_voting`, `process_votes`)
/// - chat (`add_message`)
pub struct RoomStore {
    pub(crate) rooms: HashMap<RoomCode, Room>,

    /// A player sits in at most one room at a time.
    pub(crate) player_rooms: HashMap<PlayerId, RoomCode>,

    pub(crate) config: StoreConfig,

    pub(crate) rng: StdRng,
}

impl RoomStore {
    /// Creates an empty store seeded from the OS entropy source.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Creates an empty store with a caller-supplied RNG (seeded in tests).
    pub fn with_rng(config: StoreConfig, rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            config,
            rng,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Creates a room hosted by `host` and returns it.
    ///
    /// `overrides` are merged over the default settings and validated
    /// before anything is registered.
    pub fn create(
        &mut self,
        host: PlayerId,
        profile: Profile,
        overrides: &SettingsPatch,
    ) -> Result<&Room, RoomError> {
        if let Some(current) = self.player_rooms.get(&host) {
            return Err(RoomError::AlreadyInRoom(host, current.clone()));
        }

        let settings = crate::RoomSettings::default().merged(overrides);
        settings.validate(1)?;

        let code = self.generate_code()?;
        let host_player = Player::new(host, profile, true);
        let room = Room::new(code.clone(), host_player, settings, self.config.message_capacity);

        self.player_rooms.insert(host, code.clone());
        tracing::info!(room = %code, %host, "room created");
        Ok(self.rooms.entry(code).or_insert(room))
    }

    /// Looks up a room by code.
    pub fn get(&self, code: &RoomCode) -> Result<&Room, RoomError> {
        self.rooms
            .get(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Every live room, in no particular order.
    pub fn list(&self) -> Vec<&Room> {
        self.rooms.values().collect()
    }

    /// The room `player` currently sits in, if any.
    pub fn room_of(&self, player: PlayerId) -> Option<&RoomCode> {
        self.player_rooms.get(&player)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            active_rooms: self.rooms.len(),
            connected_players: self.rooms.values().map(Room::connected_count).sum(),
        }
    }

    /// Removes rooms idle for longer than `threshold`, and rooms with no
    /// connected player at all. Returns how many were removed.
    pub fn sweep_idle(&mut self, threshold: Duration) -> usize {
        self.sweep_idle_at(Instant::now(), threshold)
    }

    pub(crate) fn sweep_idle_at(&mut self, now: Instant, threshold: Duration) -> usize {
        let doomed: Vec<RoomCode> = self
            .rooms
            .values()
            .filter(|room| {
                now.saturating_duration_since(room.last_activity) > threshold
                    || !room.has_connected_players()
            })
            .map(|room| room.code.clone())
            .collect();

        for code in &doomed {
            self.delete_room(code);
        }
        if !doomed.is_empty() {
            tracing::info!(removed = doomed.len(), remaining = self.rooms.len(), "idle rooms swept");
        }
        doomed.len()
    }

    // -- crate-internal helpers ----------------------------------------------

    pub(crate) fn room_mut(&mut self, code: &RoomCode) -> Result<&mut Room, RoomError> {
        self.rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Drops a room and every index entry pointing at it.
    pub(crate) fn delete_room(&mut self, code: &RoomCode) {
        if self.rooms.remove(code).is_some() {
            self.player_rooms.retain(|_, room| room != code);
            tracing::info!(room = %code, "room deleted");
        }
    }

    /// Draws codes until one is free, up to [`MAX_CODE_ATTEMPTS`] times.
    fn generate_code(&mut self) -> Result<RoomCode, RoomError> {
        let alphabet: Vec<char> = self.config.code_alphabet.chars().collect();
        if alphabet.is_empty() || self.config.code_length == 0 {
            tracing::warn!("room code alphabet or length is empty");
            return Err(RoomError::NoFreeCode { attempts: 0 });
        }
        for _ in 0..MAX_CODE_ATTEMPTS {
            let raw: String = (0..self.config.code_length)
                .map(|_| alphabet[self.rng.random_range(0..alphabet.len())])
                .collect();
            let code = RoomCode::new(raw);
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
            tracing::debug!(%code, "room code collision, retrying");
        }
        tracing::warn!(rooms = self.rooms.len(), "no free room code");
        Err(RoomError::NoFreeCode {
            attempts: MAX_CODE_ATTEMPTS,
        })
    }
}
