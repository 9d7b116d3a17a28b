//! Turns client actions into room-store calls and addressed events.
//!
//! Everything here runs synchronously under the room-store lock and
//! touches no sockets. The handler delivers the resulting events after
//! the call returns, still under the same lock, so every player sees
//! events in the order the store applied them.

use impostor_protocol::{PlayerId, ProtocolError, Recipient, RoomCode};
use impostor_room::{Departure, Phase, RoomError, RoomStore, RoundKey, VotingOutcome};
use impostor_tick::CountdownTick;

use crate::{ClientAction, ImpostorError, ServerEvent};

/// Events to deliver after an action, already resolved to player ids.
#[derive(Debug, Default)]
pub(crate) struct Dispatch {
    pub(crate) deliveries: Vec<(PlayerId, ServerEvent)>,
    /// Set by `finalize-voting`: a reveal countdown to start for this
    /// room, game and round.
    pub(crate) countdown: Option<(RoomCode, RoundKey)>,
}

impl Dispatch {
    /// Addresses `event`. Room recipients are the room's connected
    /// players at this instant; a room that no longer exists has none.
    fn send(&mut self, store: &RoomStore, to: Recipient, event: ServerEvent) {
        match to {
            Recipient::Player(id) => self.deliveries.push((id, event)),
            Recipient::Room(code) => {
                if let Ok(room) = store.get(&code) {
                    for player in room.connected_players() {
                        self.deliveries.push((player.id(), event.clone()));
                    }
                }
            }
            Recipient::RoomExcept(code, skip) => {
                if let Ok(room) = store.get(&code) {
                    for player in room.connected_players().filter(|p| p.id() != skip) {
                        self.deliveries.push((player.id(), event.clone()));
                    }
                }
            }
        }
    }

    /// A `room-updated` for every connected player, each with their own
    /// redacted view.
    fn send_views(&mut self, store: &RoomStore, code: &RoomCode) {
        if let Ok(room) = store.get(code) {
            for player in room.connected_players() {
                let view = room.view_for(player.id());
                self.deliveries.push((player.id(), ServerEvent::RoomUpdated { view }));
            }
        }
    }
}

/// Applies one action from `actor`.
pub(crate) fn apply(
    store: &mut RoomStore,
    actor: PlayerId,
    action: ClientAction,
) -> Result<Dispatch, ImpostorError> {
    let mut out = Dispatch::default();

    match action {
        ClientAction::CreateRoom { profile, settings } => {
            let code = store.create(actor, profile, &settings)?.code().clone();
            let view = store.get(&code)?.view_for(actor);
            out.send(store, Recipient::Player(actor), ServerEvent::RoomCreated { code, view });
        }

        ClientAction::JoinRoom { code, profile } => {
            let nickname = profile.nickname.clone();
            let view = store.join(&code, actor, profile)?.view_for(actor);
            out.send(
                store,
                Recipient::Player(actor),
                ServerEvent::RoomJoined {
                    code: code.clone(),
                    view,
                },
            );
            out.send(
                store,
                Recipient::RoomExcept(code.clone(), actor),
                ServerEvent::PlayerJoined {
                    player_id: actor,
                    nickname,
                },
            );
            out.send_views(store, &code);
        }

        ClientAction::LeaveRoom => {
            let code = current_room(store, actor)?;
            leave(store, &mut out, &code, actor)?;
            out.send(store, Recipient::Player(actor), ServerEvent::LeftRoom { code });
        }

        ClientAction::KickPlayer { target } => {
            let code = current_room(store, actor)?;
            store.kick(&code, actor, target)?;
            let event = ServerEvent::PlayerKicked { player_id: target };
            out.send(store, Recipient::Player(target), event.clone());
            out.send(store, Recipient::Room(code.clone()), event);
            out.send_views(store, &code);
        }

        ClientAction::UpdateSettings { settings } => {
            let code = current_room(store, actor)?;
            let settings = store.update_settings(&code, actor, &settings)?.clone();
            out.send(store, Recipient::Room(code.clone()), ServerEvent::SettingsUpdated { settings });
            out.send_views(store, &code);
        }

        ClientAction::StartGame => {
            let code = current_room(store, actor)?;
            let room = store.start(&code, actor)?;
            let cards: Vec<_> = room
                .connected_players()
                .filter_map(|p| room.role_card(p.id()).map(|role| (p.id(), role)))
                .collect();
            for (player, role) in cards {
                out.send(store, Recipient::Player(player), ServerEvent::GameStarted { role });
            }
            out.send_views(store, &code);
        }

        ClientAction::SendMessage { content } => {
            let content = content.trim();
            if content.is_empty() {
                return Err(ProtocolError::InvalidMessage("message is empty".into()).into());
            }
            let code = current_room(store, actor)?;
            let message = store.add_message(&code, actor, content)?.clone();
            out.send(store, Recipient::Room(code), ServerEvent::MessageReceived { message });
        }

        ClientAction::StartVoting => {
            let code = current_room(store, actor)?;
            if !store.get(&code)?.player(actor).is_some_and(|p| p.is_active()) {
                return Err(RoomError::NotActive(actor).into());
            }
            let round = store.start_voting(&code)?;
            out.send(store, Recipient::Room(code.clone()), ServerEvent::VotingStarted { round });
            out.send_views(store, &code);
        }

        ClientAction::SelectVote { target } => {
            let code = current_room(store, actor)?;
            let progress = store.select_vote(&code, actor, target)?;
            out.send(
                store,
                Recipient::Room(code.clone()),
                ServerEvent::VoteSelectionUpdated { progress },
            );
            if progress.ready_to_finalize {
                let host = store.get(&code)?.host_id();
                out.send(
                    store,
                    Recipient::Player(host),
                    ServerEvent::VotingReadyToFinalize {
                        round: progress.round,
                    },
                );
            }
            out.send_views(store, &code);
        }

        ClientAction::FinalizeVoting => {
            let code = current_room(store, actor)?;
            let key = store.finalize_voting(&code, actor)?;
            out.send_views(store, &code);
            out.countdown = Some((code, key));
        }

        ClientAction::ResetGame => {
            let code = current_room(store, actor)?;
            store.reset(&code, actor)?;
            out.send(store, Recipient::Room(code.clone()), ServerEvent::GameReset);
            out.send_views(store, &code);
        }
    }

    Ok(out)
}

/// Handles a dropped connection: the player leaves whatever room they
/// were in. Not being in a room is not an error here.
pub(crate) fn disconnect(store: &mut RoomStore, player: PlayerId) -> Dispatch {
    let mut out = Dispatch::default();
    let Some(code) = store.room_of(player).cloned() else {
        return out;
    };
    if let Err(e) = leave(store, &mut out, &code, player) {
        tracing::debug!(room = %code, player_id = %player, error = %e, "leave on disconnect failed");
    }
    out
}

/// Releases the seats of players whose reconnection window ran out and
/// tells the rest of each room. Returns how many seats were released.
pub(crate) fn release_expired(store: &mut RoomStore, players: &[PlayerId]) -> (usize, Dispatch) {
    let mut out = Dispatch::default();
    let released = store.release_seats(players);
    for (code, player) in &released {
        out.send(
            store,
            Recipient::Room(code.clone()),
            ServerEvent::PlayerLeft {
                player_id: *player,
                departure: Departure::Removed,
                new_host: None,
            },
        );
    }
    let mut rooms: Vec<&RoomCode> = released.iter().map(|(code, _)| code).collect();
    rooms.dedup();
    for code in rooms {
        out.send_views(store, code);
    }
    (released.len(), out)
}

/// One reveal countdown tick for the round `key` names in `code`.
///
/// Returns `None` when the countdown no longer applies: the room is
/// gone, the phase left REVEAL, or another round or game started. On the
/// final tick the votes are processed.
pub(crate) fn reveal_tick(
    store: &mut RoomStore,
    code: &RoomCode,
    key: RoundKey,
    tick: CountdownTick,
) -> Option<Dispatch> {
    let room = store.get(code).ok()?;
    if room.phase() != Phase::Reveal || room.round_key() != key {
        return None;
    }
    let round = key.round;

    let mut out = Dispatch::default();
    if !tick.is_final() {
        out.send(
            store,
            Recipient::Room(code.clone()),
            ServerEvent::VotingCountdown {
                round,
                remaining: tick.remaining,
            },
        );
        return Some(out);
    }

    match store.process_votes(code, key) {
        Ok(outcome) => {
            results(store, &mut out, code, outcome);
            Some(out)
        }
        Err(e) => {
            tracing::debug!(room = %code, %key, error = %e, "vote processing skipped");
            None
        }
    }
}

fn results(store: &RoomStore, out: &mut Dispatch, code: &RoomCode, outcome: VotingOutcome) {
    let winner = outcome.winner;
    out.send(store, Recipient::Room(code.clone()), ServerEvent::VotingResults { outcome });
    if let Some(winner) = winner {
        out.send(
            store,
            Recipient::Room(code.clone()),
            ServerEvent::GameEnded {
                winner,
                reason: winner.reason().to_string(),
            },
        );
    }
    out.send_views(store, code);
}

fn leave(
    store: &mut RoomStore,
    out: &mut Dispatch,
    code: &RoomCode,
    player: PlayerId,
) -> Result<(), ImpostorError> {
    let outcome = store.leave(code, player)?;
    if !outcome.room_closed {
        out.send(
            store,
            Recipient::Room(code.clone()),
            ServerEvent::PlayerLeft {
                player_id: player,
                departure: outcome.departure,
                new_host: outcome.new_host,
            },
        );
        out.send_views(store, code);
    }
    Ok(())
}

fn current_room(store: &RoomStore, player: PlayerId) -> Result<RoomCode, ImpostorError> {
    store.room_of(player).cloned().ok_or(ImpostorError::NoRoom(player))
}

#[cfg(test)]
mod tests {
    use impostor_room::{Profile, SettingsPatch, StoreConfig};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    const HOST: PlayerId = PlayerId(1);
    const BO: PlayerId = PlayerId(2);
    const CY: PlayerId = PlayerId(3);

    fn store() -> RoomStore {
        RoomStore::with_rng(StoreConfig::default(), StdRng::seed_from_u64(7))
    }

    fn act(store: &mut RoomStore, actor: PlayerId, action: ClientAction) -> Dispatch {
        apply(store, actor, action).unwrap()
    }

    fn events_for(out: &Dispatch, player: PlayerId) -> Vec<&ServerEvent> {
        out.deliveries
            .iter()
            .filter(|(to, _)| *to == player)
            .map(|(_, e)| e)
            .collect()
    }

    /// A room with three seated players; returns its code.
    fn lobby(store: &mut RoomStore) -> RoomCode {
        let out = act(
            store,
            HOST,
            ClientAction::CreateRoom {
                profile: Profile::new("ana"),
                settings: SettingsPatch::default(),
            },
        );
        let code = match &out.deliveries[..] {
            [(to, ServerEvent::RoomCreated { code, .. })] if *to == HOST => code.clone(),
            other => panic!("expected a single room-created, got {other:?}"),
        };
        for (id, name) in [(BO, "bo"), (CY, "cy")] {
            act(
                store,
                id,
                ClientAction::JoinRoom {
                    code: code.clone(),
                    profile: Profile::new(name),
                },
            );
        }
        code
    }

    #[test]
    fn test_join_notifies_joiner_and_others() {
        let mut store = store();
        let code = lobby(&mut store);
        let out = act(
            &mut store,
            PlayerId(4),
            ClientAction::JoinRoom {
                code,
                profile: Profile::new("di"),
            },
        );

        let mine = events_for(&out, PlayerId(4));
        assert!(matches!(mine[0], ServerEvent::RoomJoined { .. }));
        assert!(!mine.iter().any(|e| matches!(e, ServerEvent::PlayerJoined { .. })));

        let theirs = events_for(&out, HOST);
        assert!(theirs.iter().any(|e| matches!(e, ServerEvent::PlayerJoined { player_id, .. } if *player_id == PlayerId(4))));
        // Everyone gets exactly one refreshed view.
        for id in [HOST, BO, CY, PlayerId(4)] {
            let views = events_for(&out, id)
                .into_iter()
                .filter(|e| matches!(e, ServerEvent::RoomUpdated { .. }))
                .count();
            assert_eq!(views, 1, "{id}");
        }
    }

    #[test]
    fn test_actions_without_a_room_are_rejected() {
        let mut store = store();
        let err = apply(&mut store, HOST, ClientAction::StartGame).unwrap_err();
        assert!(matches!(err, ImpostorError::NoRoom(p) if p == HOST));
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_start_sends_each_player_only_their_role() {
        let mut store = store();
        let code = lobby(&mut store);
        let out = act(&mut store, HOST, ClientAction::StartGame);

        let room = store.get(&code).unwrap();
        for player in room.players() {
            let cards: Vec<_> = events_for(&out, player.id())
                .into_iter()
                .filter_map(|e| match e {
                    ServerEvent::GameStarted { role } => Some(role.clone()),
                    _ => None,
                })
                .collect();
            assert_eq!(cards, [room.role_card(player.id()).unwrap()]);
            assert_eq!(cards[0].secret.is_none(), player.is_impostor());
        }
    }

    #[test]
    fn test_room_views_are_redacted_per_recipient() {
        let mut store = store();
        lobby(&mut store);
        let out = act(&mut store, HOST, ClientAction::StartGame);

        for (to, event) in &out.deliveries {
            if let ServerEvent::RoomUpdated { view } = event {
                let known: Vec<_> = view
                    .players
                    .iter()
                    .filter(|p| p.is_impostor.is_some())
                    .map(|p| p.id)
                    .collect();
                assert_eq!(known, [*to]);
            }
        }
    }

    #[test]
    fn test_blank_chat_is_rejected() {
        let mut store = store();
        lobby(&mut store);
        let err = apply(&mut store, BO, ClientAction::SendMessage { content: "   ".into() }).unwrap_err();
        assert_eq!(err.status(), 400);

        let out = act(&mut store, BO, ClientAction::SendMessage { content: " gg ".into() });
        assert_eq!(out.deliveries.len(), 3);
        assert!(out.deliveries.iter().all(|(_, e)| matches!(
            e,
            ServerEvent::MessageReceived { message } if message.content == "gg"
        )));
    }

    #[test]
    fn test_ready_to_finalize_goes_to_the_host_only() {
        let mut store = store();
        lobby(&mut store);
        act(&mut store, HOST, ClientAction::StartGame);
        act(&mut store, BO, ClientAction::StartVoting);

        act(&mut store, HOST, ClientAction::SelectVote { target: Some(BO) });
        act(&mut store, BO, ClientAction::SelectVote { target: Some(CY) });
        let out = act(&mut store, CY, ClientAction::SelectVote { target: Some(BO) });

        let ready: Vec<_> = out
            .deliveries
            .iter()
            .filter(|(_, e)| matches!(e, ServerEvent::VotingReadyToFinalize { .. }))
            .map(|(to, _)| *to)
            .collect();
        assert_eq!(ready, [HOST]);
    }

    #[test]
    fn test_finalize_requests_a_countdown_and_ticks_announce_it() {
        let mut store = store();
        let code = lobby(&mut store);
        act(&mut store, HOST, ClientAction::StartGame);
        act(&mut store, HOST, ClientAction::StartVoting);
        act(&mut store, HOST, ClientAction::SelectVote { target: Some(BO) });

        let out = act(&mut store, HOST, ClientAction::FinalizeVoting);
        let key = RoundKey { game: 1, round: 1 };
        assert_eq!(out.countdown, Some((code.clone(), key)));

        let tick = reveal_tick(&mut store, &code, key, CountdownTick { remaining: 2 }).unwrap();
        assert_eq!(tick.deliveries.len(), 3);
        assert!(tick.deliveries.iter().all(|(_, e)| *e == ServerEvent::VotingCountdown { round: 1, remaining: 2 }));

        let last = reveal_tick(&mut store, &code, key, CountdownTick { remaining: 0 }).unwrap();
        let outcome = last
            .deliveries
            .iter()
            .find_map(|(_, e)| match e {
                ServerEvent::VotingResults { outcome } => Some(outcome),
                _ => None,
            })
            .unwrap();
        assert_eq!(outcome.eliminated, Some(BO));
        assert_ne!(store.get(&code).unwrap().phase(), Phase::Reveal);
    }

    #[test]
    fn test_reveal_tick_aborts_when_room_moved_on() {
        let mut store = store();
        let code = lobby(&mut store);
        act(&mut store, HOST, ClientAction::StartGame);
        act(&mut store, HOST, ClientAction::StartVoting);
        let key = act(&mut store, HOST, ClientAction::FinalizeVoting).countdown.unwrap().1;
        act(&mut store, HOST, ClientAction::ResetGame);

        assert!(reveal_tick(&mut store, &code, key, CountdownTick { remaining: 1 }).is_none());
        assert!(reveal_tick(&mut store, &code, key, CountdownTick { remaining: 0 }).is_none());
        assert_eq!(store.get(&code).unwrap().phase(), Phase::Waiting);
    }

    #[test]
    fn test_reveal_tick_from_a_reset_game_leaves_the_next_game_alone() {
        let mut store = store();
        let code = lobby(&mut store);
        act(&mut store, HOST, ClientAction::StartGame);
        act(&mut store, HOST, ClientAction::StartVoting);
        let old = act(&mut store, HOST, ClientAction::FinalizeVoting).countdown.unwrap().1;
        act(&mut store, HOST, ClientAction::ResetGame);

        act(&mut store, HOST, ClientAction::StartGame);
        act(&mut store, HOST, ClientAction::StartVoting);
        act(&mut store, HOST, ClientAction::SelectVote { target: Some(BO) });
        let new = act(&mut store, HOST, ClientAction::FinalizeVoting).countdown.unwrap().1;
        assert_eq!(old.round, new.round);
        assert_ne!(old, new);

        assert!(reveal_tick(&mut store, &code, old, CountdownTick { remaining: 0 }).is_none());
        let room = store.get(&code).unwrap();
        assert_eq!(room.phase(), Phase::Reveal);
        assert_eq!(room.selection_of(HOST), Some(BO));

        let last = reveal_tick(&mut store, &code, new, CountdownTick { remaining: 0 }).unwrap();
        assert!(last.deliveries.iter().any(|(_, e)| matches!(e, ServerEvent::VotingResults { .. })));
    }

    #[test]
    fn test_reveal_tick_aborts_when_room_is_gone() {
        let mut store = store();
        let code = RoomCode::new("NOPE00");
        let key = RoundKey { game: 1, round: 1 };
        assert!(reveal_tick(&mut store, &code, key, CountdownTick { remaining: 0 }).is_none());
    }

    #[test]
    fn test_disconnect_in_game_keeps_the_seat() {
        let mut store = store();
        let code = lobby(&mut store);
        act(&mut store, HOST, ClientAction::StartGame);

        let out = disconnect(&mut store, BO);
        assert!(out.deliveries.iter().any(|(_, e)| matches!(
            e,
            ServerEvent::PlayerLeft { player_id, departure: Departure::Disconnected, .. } if *player_id == BO
        )));
        assert!(events_for(&out, BO).is_empty());
        assert!(store.get(&code).unwrap().player(BO).is_some());
    }

    #[test]
    fn test_expired_seat_is_released_and_announced() {
        let mut store = store();
        let code = lobby(&mut store);
        act(&mut store, HOST, ClientAction::StartGame);
        disconnect(&mut store, BO);

        let (released, out) = release_expired(&mut store, &[BO]);
        assert_eq!(released, 1);

        assert!(store.get(&code).unwrap().player(BO).is_none());
        for id in [HOST, CY] {
            let mine = events_for(&out, id);
            assert!(matches!(
                mine[0],
                ServerEvent::PlayerLeft { player_id, departure: Departure::Removed, new_host: None } if *player_id == BO
            ));
            assert!(matches!(mine[1], ServerEvent::RoomUpdated { .. }));
        }
        assert!(events_for(&out, BO).is_empty());
        let (released, out) = release_expired(&mut store, &[BO]);
        assert_eq!(released, 0);
        assert!(out.deliveries.is_empty());
    }

    #[test]
    fn test_disconnect_outside_a_room_is_a_no_op() {
        let mut store = store();
        assert!(disconnect(&mut store, PlayerId(99)).deliveries.is_empty());
    }

    #[test]
    fn test_kicked_player_is_told_directly() {
        let mut store = store();
        lobby(&mut store);
        let out = act(&mut store, HOST, ClientAction::KickPlayer { target: CY });

        assert_eq!(events_for(&out, CY), [&ServerEvent::PlayerKicked { player_id: CY }]);
        assert!(store.room_of(CY).is_none());
    }
}
