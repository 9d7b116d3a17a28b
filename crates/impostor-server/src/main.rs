//! Runs the impostor game server.
//!
//! Configuration comes from the environment (see [`ServerConfig::from_env`]);
//! log filtering from `RUST_LOG`, defaulting to `info`.

use impostor::{ImpostorError, ImpostorServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ImpostorError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        reconnect_grace = ?config.session.reconnect_grace,
        idle_timeout = ?config.store.idle_timeout,
        sweep_interval = ?config.sweep_interval,
        "starting impostor server"
    );

    let server = ImpostorServer::builder().config(config).build().await?;
    server.run().await
}
