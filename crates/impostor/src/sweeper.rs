//! Periodic maintenance: stale sessions, their seats, and idle rooms.

use std::sync::Arc;
use std::time::Duration;

use impostor_protocol::Codec;
use impostor_tick::{TickInfo, Ticker, TickerConfig};

use crate::dispatch;
use crate::server::ServerState;

pub(crate) async fn run<C: Codec>(state: Arc<ServerState<C>>, period: Duration) {
    let mut ticker = Ticker::new(TickerConfig::with_period(period));
    loop {
        let info = ticker.tick().await;
        sweep(&state, &info).await;
        if let Some(took) = ticker.record_tick_end() {
            tracing::debug!(sweep = info.tick, ?took, "maintenance sweep finished");
        }
    }
}

/// One pass. The two locks are taken one after the other, never together.
pub(crate) async fn sweep<C: Codec>(state: &ServerState<C>, info: &TickInfo) {
    if info.overrun {
        tracing::warn!(sweep = info.tick, missed = info.ticks_skipped, "maintenance sweep ran late");
    }

    let expired = {
        let mut sessions = state.sessions.lock().await;
        let expired = sessions.expire_stale();
        sessions.cleanup_expired();
        expired
    };

    let (released, swept, health) = {
        let mut rooms = state.rooms.lock().await;
        let (released, out) = dispatch::release_expired(&mut rooms, &expired);
        state.deliver(out).await;
        let idle_timeout = rooms.config().idle_timeout;
        (released, rooms.sweep_idle(idle_timeout), rooms.health())
    };

    tracing::info!(
        sweep = info.tick,
        swept,
        expired_sessions = expired.len(),
        released_seats = released,
        active_rooms = health.active_rooms,
        connected_players = health.connected_players,
        "maintenance sweep"
    );
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use impostor_protocol::{JsonCodec, PlayerId, RoomCode};
    use impostor_room::{Profile, RoomStore, SettingsPatch, StoreConfig};
    use impostor_session::{SessionConfig, SessionManager};
    use impostor_tick::CountdownConfig;
    use tokio::sync::Mutex;

    use super::*;

    const FIRST: TickInfo = TickInfo {
        tick: 1,
        overrun: false,
        ticks_skipped: 0,
    };

    fn state(idle_timeout: Duration, grace: Duration) -> ServerState<JsonCodec> {
        ServerState {
            sessions: Mutex::new(SessionManager::new(SessionConfig { reconnect_grace: grace })),
            rooms: Mutex::new(RoomStore::new(StoreConfig {
                idle_timeout,
                ..StoreConfig::default()
            })),
            outboxes: Mutex::new(HashMap::new()),
            codec: JsonCodec,
            countdown: CountdownConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_idle_rooms_and_expired_sessions() {
        let state = state(Duration::ZERO, Duration::ZERO);
        let player = {
            let mut sessions = state.sessions.lock().await;
            let id = sessions.open().player_id;
            sessions.disconnect(id).unwrap();
            id
        };
        state
            .rooms
            .lock()
            .await
            .create(PlayerId(50), Profile::new("ana"), &SettingsPatch::default())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        sweep(&state, &FIRST).await;

        assert!(state.rooms.lock().await.is_empty());
        assert!(state.sessions.lock().await.get(player).is_none());
    }

    #[tokio::test]
    async fn test_sweep_keeps_active_rooms() {
        let state = state(Duration::from_secs(3600), Duration::from_secs(3600));
        state
            .rooms
            .lock()
            .await
            .create(PlayerId(50), Profile::new("ana"), &SettingsPatch::default())
            .unwrap();

        sweep(&state, &FIRST).await;

        assert_eq!(state.rooms.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_releases_seats_of_expired_sessions() {
        let state = state(Duration::from_secs(3600), Duration::ZERO);
        let (gone, stays) = {
            let mut sessions = state.sessions.lock().await;
            (sessions.open().player_id, sessions.open().player_id)
        };
        let code: RoomCode = {
            let mut rooms = state.rooms.lock().await;
            let code = rooms
                .create(PlayerId(50), Profile::new("ana"), &SettingsPatch::default())
                .unwrap()
                .code()
                .clone();
            rooms.join(&code, gone, Profile::new("bo")).unwrap();
            rooms.join(&code, stays, Profile::new("cy")).unwrap();
            rooms.start(&code, PlayerId(50)).unwrap();
            rooms.leave(&code, gone).unwrap();
            code
        };
        state.sessions.lock().await.disconnect(gone).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        sweep(&state, &FIRST).await;

        let rooms = state.rooms.lock().await;
        let room = rooms.get(&code).unwrap();
        assert!(room.player(gone).is_none());
        assert!(room.player(stays).unwrap().is_connected());
        assert!(state.sessions.lock().await.get(gone).is_none());
    }
}
