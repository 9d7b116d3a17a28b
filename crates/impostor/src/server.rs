//! `ImpostorServer` builder and accept loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use impostor_protocol::{Codec, JsonCodec, Payload, PlayerId};
use impostor_room::{RoomStore, StoreConfig};
use impostor_session::{SessionConfig, SessionManager};
use impostor_tick::CountdownConfig;
use impostor_transport::{Transport, WebSocketTransport};
use tokio::sync::{Mutex, mpsc};

use crate::dispatch::Dispatch;
use crate::handler::handle_connection;
use crate::{ImpostorError, ServerConfig, ServerEvent, countdown, sweeper};

/// Clients must send this in `Hello` or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// What a connection's writer task sends.
pub(crate) type Outgoing = Payload<ServerEvent>;
pub(crate) type Outbox = mpsc::UnboundedSender<Outgoing>;

/// Shared by every connection task, the countdowns, and the sweeper.
///
/// Lock order is `rooms` then `outboxes`. `sessions` is never held
/// together with either.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Mutex<RoomStore>,
    pub(crate) outboxes: Mutex<HashMap<PlayerId, Outbox>>,
    pub(crate) codec: C,
    pub(crate) countdown: CountdownConfig,
}

impl<C: Codec> ServerState<C> {
    /// Queues each event on its recipient's outbox. Players without a
    /// live connection are skipped.
    pub(crate) async fn deliver(&self, dispatch: Dispatch) {
        if dispatch.deliveries.is_empty() {
            return;
        }
        let outboxes = self.outboxes.lock().await;
        for (player, event) in dispatch.deliveries {
            if let Some(tx) = outboxes.get(&player) {
                let _ = tx.send(Payload::Game(event));
            }
        }
    }
}

/// Builder for an [`ImpostorServer`].
///
/// ```rust,no_run
/// # async fn run() -> Result<(), impostor::ImpostorError> {
/// use impostor::ImpostorServer;
///
/// let server = ImpostorServer::builder().bind("0.0.0.0:3001").build().await?;
/// server.run().await
/// # }
/// ```
pub struct ImpostorServerBuilder {
    config: ServerConfig,
}

impl ImpostorServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn store_config(mut self, config: StoreConfig) -> Self {
        self.config.store = config;
        self
    }

    /// Shape of the reveal countdown run after each finalized vote.
    pub fn countdown(mut self, config: CountdownConfig) -> Self {
        self.config.countdown = config;
        self
    }

    pub fn sweep_interval(mut self, period: Duration) -> Self {
        self.config.sweep_interval = period;
        self
    }

    /// Binds the listener. Nothing is accepted until [`ImpostorServer::run`].
    pub async fn build(self) -> Result<ImpostorServer<JsonCodec>, ImpostorError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(self.config.session)),
            rooms: Mutex::new(RoomStore::new(self.config.store)),
            outboxes: Mutex::new(HashMap::new()),
            codec: JsonCodec,
            countdown: self.config.countdown,
        });

        Ok(ImpostorServer {
            transport,
            state,
            sweep_interval: self.config.sweep_interval,
        })
    }
}

impl Default for ImpostorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound impostor game server.
pub struct ImpostorServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    sweep_interval: Duration,
}

impl ImpostorServer<JsonCodec> {
    pub fn builder() -> ImpostorServerBuilder {
        ImpostorServerBuilder::new()
    }
}

impl<C: Codec> ImpostorServer<C> {
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Starts the idle sweeper and accepts connections until the process
    /// ends. Each connection runs in its own task.
    pub async fn run(mut self) -> Result<(), ImpostorError> {
        tracing::info!(addr = ?self.local_addr().ok(), "impostor server running");
        tokio::spawn(sweeper::run(Arc::clone(&self.state), self.sweep_interval));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Starts the reveal countdown requested by a dispatch, if any.
pub(crate) fn start_countdown<C: Codec>(state: &Arc<ServerState<C>>, dispatch: &Dispatch) {
    if let Some((code, key)) = dispatch.countdown.clone() {
        tokio::spawn(countdown::run(Arc::clone(state), code, key));
    }
}
