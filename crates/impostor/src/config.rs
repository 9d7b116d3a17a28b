//! Process-level configuration.

use std::time::Duration;

use impostor_room::StoreConfig;
use impostor_session::SessionConfig;
use impostor_tick::CountdownConfig;

/// A malformed configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub session: SessionConfig,
    pub store: StoreConfig,
    /// Period of the idle-room sweep.
    pub sweep_interval: Duration,
    pub countdown: CountdownConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            session: SessionConfig::default(),
            store: StoreConfig::default(),
            sweep_interval: Duration::from_secs(60 * 60),
            countdown: CountdownConfig::default(),
        }
    }
}

impl ServerConfig {
    pub const BIND_VAR: &'static str = "IMPOSTOR_BIND";
    pub const PORT_VAR: &'static str = "PORT";
    pub const RECONNECT_GRACE_VAR: &'static str = "IMPOSTOR_RECONNECT_GRACE_SECS";
    pub const IDLE_TIMEOUT_VAR: &'static str = "IMPOSTOR_IDLE_TIMEOUT_SECS";
    pub const SWEEP_INTERVAL_VAR: &'static str = "IMPOSTOR_SWEEP_INTERVAL_SECS";

    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset keys keep their defaults.
    ///
    /// `IMPOSTOR_BIND` wins over `PORT`; a bare `PORT` binds every
    /// interface, which is what container platforms expect.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup(Self::BIND_VAR) {
            config.bind_addr = addr;
        } else if let Some(port) = lookup(Self::PORT_VAR) {
            let port: u16 = parse(Self::PORT_VAR, &port)?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }

        if let Some(raw) = lookup(Self::RECONNECT_GRACE_VAR) {
            config.session.reconnect_grace = Duration::from_secs(parse(Self::RECONNECT_GRACE_VAR, &raw)?);
        }
        if let Some(raw) = lookup(Self::IDLE_TIMEOUT_VAR) {
            config.store.idle_timeout = Duration::from_secs(parse(Self::IDLE_TIMEOUT_VAR, &raw)?);
        }
        if let Some(raw) = lookup(Self::SWEEP_INTERVAL_VAR) {
            let secs: u64 = parse(Self::SWEEP_INTERVAL_VAR, &raw)?;
            if secs == 0 {
                return Err(ConfigError {
                    key: Self::SWEEP_INTERVAL_VAR,
                    value: raw,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.sweep_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3001");
        assert_eq!(config.session.reconnect_grace, Duration::from_secs(120));
        assert_eq!(config.store.idle_timeout, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
        assert_eq!(config.countdown.ticks, 3);
    }

    #[test]
    fn test_port_binds_all_interfaces() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", "8080")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_explicit_bind_wins_over_port() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("IMPOSTOR_BIND", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_durations_are_read_in_seconds() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("IMPOSTOR_RECONNECT_GRACE_SECS", "30"),
            ("IMPOSTOR_IDLE_TIMEOUT_SECS", " 600 "),
            ("IMPOSTOR_SWEEP_INTERVAL_SECS", "60"),
        ]))
        .unwrap();
        assert_eq!(config.session.reconnect_grace, Duration::from_secs(30));
        assert_eq!(config.store.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_malformed_value_is_an_error() {
        let err = ServerConfig::from_lookup(lookup(&[("IMPOSTOR_IDLE_TIMEOUT_SECS", "a day")])).unwrap_err();
        assert_eq!(err.key, "IMPOSTOR_IDLE_TIMEOUT_SECS");
        assert!(err.to_string().contains("a day"));
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("IMPOSTOR_SWEEP_INTERVAL_SECS", "0")])).unwrap_err();
        assert_eq!(err.key, "IMPOSTOR_SWEEP_INTERVAL_SECS");
    }

    #[test]
    fn test_port_out_of_range() {
        assert!(ServerConfig::from_lookup(lookup(&[("PORT", "70000")])).is_err());
    }
}
