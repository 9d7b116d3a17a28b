//! Joining, leaving, kicking, and host-controlled settings.

use impostor_protocol::{PlayerId, RoomCode};
use serde::{Deserialize, Serialize};

use crate::{Phase, Player, Profile, Room, RoomError, RoomSettings, RoomStore, SettingsPatch};

/// How a player left a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Departure {
    /// Seat kept, flagged disconnected, may rejoin with the same identity.
    Disconnected,
    /// Seat released.
    Removed,
}

/// What a [`RoomStore::leave`] call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub departure: Departure,
    /// Set when the host role moved to another player.
    pub new_host: Option<PlayerId>,
    /// Set when nobody connected was left and the room was deleted.
    pub room_closed: bool,
}

impl RoomStore {
    /// Seats `player` in the room, or resumes their old seat.
    ///
    /// An identity already seated in the room resumes its seat when
    /// `allow_reconnect` is on, whatever the phase. Brand-new identities
    /// are only accepted while [`Phase::Waiting`] and while seats remain.
    pub fn join(
        &mut self,
        code: &RoomCode,
        player: PlayerId,
        profile: Profile,
    ) -> Result<&Room, RoomError> {
        if let Some(current) = self.player_rooms.get(&player) {
            if current != code {
                return Err(RoomError::AlreadyInRoom(player, current.clone()));
            }
        }

        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;

        if let Some(index) = room.players.iter().position(|p| p.id == player) {
            if !room.settings.allow_reconnect {
                return Err(RoomError::AlreadyInRoom(player, code.clone()));
            }
            let seat = &mut room.players[index];
            let resumed = !seat.is_connected;
            seat.is_connected = true;
            seat.mark_seen();
            let nickname = seat.profile.nickname.clone();

            if resumed {
                room.system_message(format!("{nickname} reconnected"));
                tracing::info!(room = %code, player_id = %player, "player reconnected");
            }
            if let Some(host) = room.ensure_host() {
                announce_host(room, host);
            }
        } else {
            if !room.phase.is_joinable() {
                return Err(room.wrong_phase("join"));
            }
            if room.players.len() >= room.settings.max_players {
                return Err(RoomError::RoomFull(code.clone()));
            }
            room.system_message(format!("{} joined the room", profile.nickname));
            room.players.push(Player::new(player, profile, false));
            tracing::info!(room = %code, player_id = %player, players = room.players.len(), "player joined");
        }

        room.touch();
        self.player_rooms.insert(player, code.clone());
        Ok(&*room)
    }

    /// Takes `player` out of the room.
    ///
    /// During a game with `allow_reconnect` the seat is kept and only
    /// flagged disconnected; otherwise it is released. The host role moves
    /// to the first connected player by join order if needed, and the room
    /// is deleted as soon as nobody connected remains.
    pub fn leave(&mut self, code: &RoomCode, player: PlayerId) -> Result<LeaveOutcome, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;

        let seat = room
            .player(player)
            .ok_or_else(|| RoomError::NotInRoom(player, code.clone()))?;
        if !seat.is_connected {
            return Err(RoomError::NotActive(player));
        }
        let nickname = seat.profile.nickname.clone();

        let departure = if room.settings.allow_reconnect && room.phase != Phase::Waiting {
            if let Some(seat) = room.player_mut(player) {
                seat.is_connected = false;
                seat.mark_seen();
            }
            room.system_message(format!("{nickname} disconnected"));
            Departure::Disconnected
        } else {
            room.remove_player(player);
            room.system_message(format!("{nickname} left the room"));
            Departure::Removed
        };

        let new_host = room.ensure_host();
        if let Some(host) = new_host {
            announce_host(room, host);
        }
        room.touch();
        let room_closed = !room.has_connected_players();

        if self.player_rooms.get(&player) == Some(code) {
            self.player_rooms.remove(&player);
        }
        tracing::info!(room = %code, player_id = %player, ?departure, "player left");

        if room_closed {
            self.delete_room(code);
        }

        Ok(LeaveOutcome {
            departure,
            new_host,
            room_closed,
        })
    }

    /// Removes `target` from the room on the host's behalf.
    ///
    /// The seat is always released, whatever `allow_reconnect` says.
    /// Returns the removed player.
    pub fn kick(
        &mut self,
        code: &RoomCode,
        host: PlayerId,
        target: PlayerId,
    ) -> Result<Player, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        room.require_host(host)?;
        if target == host {
            return Err(RoomError::InvalidTarget(target));
        }

        let kicked = room
            .remove_player(target)
            .ok_or(RoomError::InvalidTarget(target))?;
        room.system_message(format!("{} was kicked by the host", kicked.profile.nickname));
        room.touch();

        if self.player_rooms.get(&target) == Some(code) {
            self.player_rooms.remove(&target);
        }
        tracing::info!(room = %code, player_id = %target, "player kicked");
        Ok(kicked)
    }

    /// Releases the disconnected seats of `players`, whose reconnection
    /// window is over. Connected seats are left alone.
    ///
    /// Returns the released `(room, player)` pairs. Rooms are not touched,
    /// so releasing seats does not keep an idle room alive.
    pub fn release_seats(&mut self, players: &[PlayerId]) -> Vec<(RoomCode, PlayerId)> {
        let mut released = Vec::new();
        for room in self.rooms.values_mut() {
            let gone: Vec<PlayerId> = room
                .players
                .iter()
                .filter(|p| !p.is_connected && players.contains(&p.id))
                .map(|p| p.id)
                .collect();
            for id in gone {
                if let Some(seat) = room.remove_player(id) {
                    room.system_message(format!("{} did not come back", seat.profile.nickname));
                    tracing::info!(room = %room.code, player_id = %id, "seat released");
                    released.push((room.code.clone(), id));
                }
            }
        }
        released
    }

    /// Applies `patch` to the room's settings. Host only, lobby only.
    pub fn update_settings(
        &mut self,
        code: &RoomCode,
        host: PlayerId,
        patch: &SettingsPatch,
    ) -> Result<&RoomSettings, RoomError> {
        let room = self.room_mut(code)?;
        room.require_host(host)?;
        room.require_phase(Phase::Waiting, "change settings")?;

        let settings = room.settings.merged(patch);
        settings.validate(room.players.len())?;
        room.settings = settings;
        room.touch();

        tracing::debug!(room = %code, settings = ?room.settings, "settings updated");
        Ok(&room.settings)
    }
}

fn announce_host(room: &mut Room, host: PlayerId) {
    let nickname = room
        .player(host)
        .map(|p| p.profile.nickname.clone())
        .unwrap_or_default();
    room.system_message(format!("{nickname} is now the host"));
    tracing::info!(room = %room.code, player_id = %host, "host transferred");
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::StoreConfig;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn store_with_room(patch: SettingsPatch, guests: &[u64]) -> (RoomStore, RoomCode) {
        let mut store = RoomStore::with_rng(StoreConfig::default(), StdRng::seed_from_u64(3));
        let code = store.create(pid(1), Profile::new("host"), &patch).unwrap().code().clone();
        for id in guests {
            store.join(&code, pid(*id), Profile::new(format!("p{id}"))).unwrap();
        }
        (store, code)
    }

    fn in_game(store: &mut RoomStore, code: &RoomCode) {
        store.room_mut(code).unwrap().phase = Phase::Discussion;
    }

    #[test]
    fn test_join_appends_non_host_in_order() {
        let (store, code) = store_with_room(SettingsPatch::default(), &[2, 3]);
        let room = store.get(&code).unwrap();

        let ids: Vec<PlayerId> = room.players().iter().map(Player::id).collect();
        assert_eq!(ids, [pid(1), pid(2), pid(3)]);
        assert!(!room.player(pid(2)).unwrap().is_host());
        assert_eq!(store.room_of(pid(3)), Some(&code));
    }

    #[test]
    fn test_join_unknown_room() {
        let (mut store, _) = store_with_room(SettingsPatch::default(), &[]);
        let err = store.join(&RoomCode::new("ZZZZZZ"), pid(2), Profile::new("x")).unwrap_err();
        assert!(matches!(err, RoomError::NotFound(_)));
    }

    #[test]
    fn test_join_rejects_player_seated_elsewhere() {
        let (mut store, first) = store_with_room(SettingsPatch::default(), &[2]);
        let second = store.create(pid(9), Profile::new("other"), &SettingsPatch::default()).unwrap().code().clone();

        let err = store.join(&second, pid(2), Profile::new("p2")).unwrap_err();
        assert_eq!(err, RoomError::AlreadyInRoom(pid(2), first));
    }

    #[test]
    fn test_join_same_identity_without_reconnect_is_already_in_room() {
        let patch = SettingsPatch {
            allow_reconnect: Some(false),
            ..SettingsPatch::default()
        };
        let (mut store, code) = store_with_room(patch, &[2]);
        let err = store.join(&code, pid(2), Profile::new("p2")).unwrap_err();
        assert_eq!(err, RoomError::AlreadyInRoom(pid(2), code.clone()));
        assert_eq!(store.get(&code).unwrap().players().len(), 2);
    }

    #[test]
    fn test_leave_in_lobby_releases_seat() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2, 3]);

        let outcome = store.leave(&code, pid(3)).unwrap();

        assert_eq!(outcome.departure, Departure::Removed);
        assert_eq!(outcome.new_host, None);
        assert!(!outcome.room_closed);
        assert!(store.get(&code).unwrap().player(pid(3)).is_none());
        assert_eq!(store.room_of(pid(3)), None);
    }

    #[test]
    fn test_leave_mid_game_keeps_seat_for_reconnect() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2, 3]);
        in_game(&mut store, &code);

        let outcome = store.leave(&code, pid(2)).unwrap();
        assert_eq!(outcome.departure, Departure::Disconnected);
        let seat = store.get(&code).unwrap().player(pid(2)).unwrap();
        assert!(!seat.is_connected());

        // Same identity comes back before the seat is swept.
        let room = store.join(&code, pid(2), Profile::new("p2")).unwrap();
        assert_eq!(room.players().len(), 3);
        assert!(room.player(pid(2)).unwrap().is_connected());
        assert_eq!(room.messages().latest().unwrap().content, "p2 reconnected");
    }

    #[test]
    fn test_release_seats_drops_only_disconnected_seats() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2, 3]);
        in_game(&mut store, &code);
        store.leave(&code, pid(2)).unwrap();

        let released = store.release_seats(&[pid(2), pid(3), pid(42)]);

        assert_eq!(released, [(code.clone(), pid(2))]);
        let room = store.get(&code).unwrap();
        assert!(room.player(pid(2)).is_none());
        assert!(room.player(pid(3)).unwrap().is_connected());
        assert_eq!(room.messages().latest().unwrap().content, "p2 did not come back");

        // The identity is a stranger now: no mid-game seat to resume.
        assert!(matches!(
            store.join(&code, pid(2), Profile::new("p2")),
            Err(RoomError::WrongPhase { .. })
        ));
    }

    #[test]
    fn test_leave_twice_is_a_refusal_not_a_corruption() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2, 3]);
        in_game(&mut store, &code);
        store.leave(&code, pid(2)).unwrap();

        assert_eq!(store.leave(&code, pid(2)).unwrap_err(), RoomError::NotActive(pid(2)));
        assert_eq!(store.get(&code).unwrap().players().len(), 3);
    }

    #[test]
    fn test_host_soft_disconnect_moves_host() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2, 3]);
        in_game(&mut store, &code);

        let outcome = store.leave(&code, pid(1)).unwrap();

        assert_eq!(outcome.new_host, Some(pid(2)));
        let room = store.get(&code).unwrap();
        assert_eq!(room.host_id(), pid(2));
        assert!(!room.player(pid(1)).unwrap().is_host());

        // The old host returns as a regular player.
        let room = store.join(&code, pid(1), Profile::new("host")).unwrap();
        assert_eq!(room.host_id(), pid(2));
        assert_eq!(room.players().iter().filter(|p| p.is_host()).count(), 1);
    }

    #[test]
    fn test_last_connected_player_leaving_closes_room() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2]);
        in_game(&mut store, &code);
        store.leave(&code, pid(2)).unwrap();

        let outcome = store.leave(&code, pid(1)).unwrap();

        assert!(outcome.room_closed);
        assert!(store.get(&code).is_err());
        assert_eq!(store.room_of(pid(1)), None);
    }

    #[test]
    fn test_kick_requires_host() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2, 3]);
        let err = store.kick(&code, pid(2), pid(3)).unwrap_err();
        assert_eq!(err, RoomError::NotHost(pid(2), code.clone()));
    }

    #[test]
    fn test_kick_releases_seat_even_mid_game() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2, 3]);
        in_game(&mut store, &code);

        let kicked = store.kick(&code, pid(1), pid(3)).unwrap();

        assert_eq!(kicked.id(), pid(3));
        assert!(store.get(&code).unwrap().player(pid(3)).is_none());
        assert_eq!(store.room_of(pid(3)), None);
    }

    #[test]
    fn test_kick_absent_or_self_is_invalid_target() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2]);
        store.kick(&code, pid(1), pid(2)).unwrap();

        assert_eq!(store.kick(&code, pid(1), pid(2)).unwrap_err(), RoomError::InvalidTarget(pid(2)));
        assert_eq!(store.kick(&code, pid(1), pid(1)).unwrap_err(), RoomError::InvalidTarget(pid(1)));
        assert_eq!(store.get(&code).unwrap().players().len(), 1);
    }

    #[test]
    fn test_update_settings_host_only_in_lobby() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2]);
        let patch = SettingsPatch {
            impostor_count: Some(2),
            ..SettingsPatch::default()
        };

        assert!(matches!(store.update_settings(&code, pid(2), &patch), Err(RoomError::NotHost(..))));
        assert_eq!(store.update_settings(&code, pid(1), &patch).unwrap().impostor_count, 2);

        in_game(&mut store, &code);
        let err = store.update_settings(&code, pid(1), &patch).unwrap_err();
        assert!(matches!(err, RoomError::WrongPhase { phase: Phase::Discussion, .. }));
    }

    #[test]
    fn test_update_settings_cannot_shrink_below_seated_players() {
        let (mut store, code) = store_with_room(SettingsPatch::default(), &[2, 3, 4]);
        let patch = SettingsPatch {
            max_players: Some(3),
            ..SettingsPatch::default()
        };
        assert!(matches!(
            store.update_settings(&code, pid(1), &patch),
            Err(RoomError::InvalidSettings(_))
        ));
        assert_eq!(store.get(&code).unwrap().settings().max_players, 6);
    }
}
