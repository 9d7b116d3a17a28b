//! Per-connection handler: handshake, action routing, and cleanup.
//!
//! Each accepted connection gets its own task running this handler:
//!   1. Receive `Hello`, check the version, open or resume a session
//!   2. Send `Welcome` and register the player's outbox
//!   3. Loop: decode envelopes, answer heartbeats, dispatch game actions
//!   4. On exit, leave the room and start the session's grace period
//!
//! A second task per connection drains the outbox onto the socket, so
//! events produced by other players' actions reach this player while the
//! handler is parked in `recv`.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use impostor_protocol::{Codec, Envelope, Payload, PlayerId, ProtocolError, SystemMessage};
use impostor_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::dispatch;
use crate::server::{Outbox, Outgoing, PROTOCOL_VERSION, ServerState, start_countdown};
use crate::{ClientAction, ImpostorError};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A client that sends nothing, not even a heartbeat, for this long is
/// dropped.
const IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Drop guard that takes the player out of their room and disconnects
/// their session when the handler exits, panics included. `Drop` is
/// synchronous, so the async cleanup runs in a spawned task.
struct ConnectionGuard<C: Codec> {
    player_id: PlayerId,
    outbox: Outbox,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let outbox = self.outbox.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            {
                let mut outboxes = state.outboxes.lock().await;
                // A resumed connection may already own the slot.
                if outboxes.get(&player_id).is_some_and(|tx| tx.same_channel(&outbox)) {
                    outboxes.remove(&player_id);
                }
            }
            {
                let mut rooms = state.rooms.lock().await;
                let out = dispatch::disconnect(&mut rooms, player_id);
                state.deliver(out).await;
            }
            let mut sessions = state.sessions.lock().await;
            let _ = sessions.disconnect(player_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), ImpostorError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let start = Instant::now();
    tracing::debug!(%conn_id, "handling new connection");

    let player_id = perform_handshake(&conn, &state, &start).await?;
    tracing::info!(%conn_id, %player_id, "player connected");

    let (tx, rx) = mpsc::unbounded_channel();
    state.outboxes.lock().await.insert(player_id, tx.clone());
    let _guard = ConnectionGuard {
        player_id,
        outbox: tx.clone(),
        state: Arc::clone(&state),
    };
    let writer = tokio::spawn(write_outbox(Arc::clone(&conn), Arc::clone(&state), rx, start));

    loop {
        let data = match tokio::time::timeout(IDLE_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope<ClientAction> = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                send_error(&tx, 400, &format!("invalid message: {e}"));
                continue;
            }
        };

        match envelope.payload {
            Payload::System(msg) => {
                if handle_system_message(&tx, player_id, msg, &start) {
                    break;
                }
            }
            Payload::Game(action) => handle_action(&state, &tx, player_id, action).await,
        }
    }

    writer.abort();
    // _guard drops here → room leave and session disconnect.
    Ok(())
}

/// Receives `Hello`, opens or resumes the session, sends `Welcome`.
async fn perform_handshake<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    start: &Instant,
) -> Result<PlayerId, ImpostorError> {
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into()),
    };

    let envelope: Envelope<ClientAction> = state.codec.decode(&data)?;
    let (version, resume_token) = match envelope.payload {
        Payload::System(SystemMessage::Hello { version, resume_token }) => (version, resume_token),
        _ => {
            send_error_now(conn, &state.codec, 400, "expected Hello", start).await?;
            return Err(ProtocolError::InvalidMessage("first message must be Hello".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        send_error_now(
            conn,
            &state.codec,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            start,
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let (player_id, token, resumed) = {
        let mut sessions = state.sessions.lock().await;
        let resumed = match resume_token.as_deref() {
            Some(token) => match sessions.reconnect(token) {
                Ok(session) => Some((session.player_id, session.reconnect_token.clone())),
                Err(e) => {
                    tracing::debug!(error = %e, "resume refused, opening a new session");
                    None
                }
            },
            None => None,
        };
        match resumed {
            Some((id, token)) => (id, token, true),
            None => {
                let session = sessions.open();
                (session.player_id, session.reconnect_token.clone(), false)
            }
        }
    };

    let welcome: Envelope<()> = Envelope::system(
        0,
        elapsed_millis(start),
        SystemMessage::Welcome {
            player_id,
            resume_token: token,
            resumed,
            server_time: unix_millis(),
        },
    );
    conn.send(&state.codec.encode(&welcome)?).await?;
    Ok(player_id)
}

/// Answers a system message. Returns `true` if the connection should close.
fn handle_system_message(tx: &Outbox, player_id: PlayerId, msg: SystemMessage, start: &Instant) -> bool {
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let _ = tx.send(Payload::System(SystemMessage::HeartbeatAck {
                client_time,
                server_time: elapsed_millis(start),
            }));
        }
        SystemMessage::Disconnect { reason } => {
            tracing::info!(%player_id, %reason, "client disconnected");
            return true;
        }
        _ => {
            tracing::debug!(%player_id, "ignoring unexpected system message");
        }
    }
    false
}

/// Runs one game action under the room-store lock and fans out the result.
async fn handle_action<C: Codec>(
    state: &Arc<ServerState<C>>,
    tx: &Outbox,
    player_id: PlayerId,
    action: ClientAction,
) {
    let name = action.name();
    let mut rooms = state.rooms.lock().await;
    match dispatch::apply(&mut rooms, player_id, action) {
        Ok(out) => {
            start_countdown(state, &out);
            state.deliver(out).await;
        }
        Err(e) => {
            tracing::debug!(%player_id, action = name, error = %e, "action rejected");
            send_error(tx, e.status(), &e.to_string());
        }
    }
}

/// Encodes outbox entries and writes them to the socket in order.
async fn write_outbox<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    start: Instant,
) {
    // seq 0 was the Welcome.
    let mut seq: u64 = 1;
    while let Some(payload) = rx.recv().await {
        let envelope = Envelope {
            seq: next_seq(&mut seq),
            timestamp: elapsed_millis(&start),
            payload,
        };
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(conn_id = %conn.id(), error = %e, "failed to encode outgoing message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, stopping writer");
            break;
        }
    }
}

fn send_error(tx: &Outbox, code: u16, message: &str) {
    let _ = tx.send(Payload::System(SystemMessage::Error {
        code,
        message: message.to_string(),
    }));
}

/// Writes an error straight to the socket, before the writer task exists.
async fn send_error_now(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
    start: &Instant,
) -> Result<(), ImpostorError> {
    let envelope: Envelope<()> = Envelope::system(
        0,
        elapsed_millis(start),
        SystemMessage::Error {
            code,
            message: message.to_string(),
        },
    );
    conn.send(&codec.encode(&envelope)?).await?;
    Ok(())
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

fn elapsed_millis(start: &Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
