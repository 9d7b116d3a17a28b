//! Drives the reveal countdown for one finalized vote.

use std::sync::Arc;

use impostor_protocol::{Codec, RoomCode};
use impostor_room::RoundKey;
use impostor_tick::Countdown;

use crate::dispatch;
use crate::server::ServerState;

/// Runs until the final tick processes the votes, or until the room no
/// longer matches what was finalized.
pub(crate) async fn run<C: Codec>(state: Arc<ServerState<C>>, code: RoomCode, key: RoundKey) {
    let mut countdown = Countdown::new(state.countdown);
    tracing::debug!(room = %code, %key, "reveal countdown started");

    while let Some(tick) = countdown.next_tick().await {
        let mut rooms = state.rooms.lock().await;
        let Some(out) = dispatch::reveal_tick(&mut rooms, &code, key, tick) else {
            tracing::debug!(room = %code, %key, remaining = tick.remaining, "reveal countdown abandoned");
            return;
        };
        state.deliver(out).await;
    }
}
