//! Server configuration.

use std::time::Duration;

use crate::InitiativeError;

/// Port used when `PORT` is not set.
const DEFAULT_PORT: u16 = 8080;

/// Settings for an [`InitiativeServer`](crate::InitiativeServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Capacity of each connection's outbound queue. When a slow client
    /// lets it fill up, further state updates for that client are dropped.
    pub outbound_capacity: usize,

    /// How long a new connection has to send its `join` command.
    pub join_timeout: Duration,

    /// A connection that sends nothing for this long is closed.
    ///
    /// Only inbound frames count. The server sends no pings and outbound
    /// state updates don't reset the timer, so a client that only watches
    /// must send a text or binary frame to stay connected. Ping and pong
    /// frames don't count.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            outbound_capacity: 16,
            join_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// - `PORT` - listen on `0.0.0.0:$PORT` (default 8080)
    /// - `INITIATIVE_OUTBOUND_CAPACITY` - per-connection queue size
    pub fn from_env() -> Result<Self, InitiativeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, InitiativeError> {
        let mut config = Self::default();

        match lookup("PORT").filter(|p| !p.is_empty()) {
            Some(port) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| InitiativeError::Config(format!("PORT is not a port number: {port:?}")))?;
                config.bind_addr = format!("0.0.0.0:{port}");
            }
            None => tracing::info!(port = DEFAULT_PORT, "defaulting to port"),
        }

        if let Some(raw) = lookup("INITIATIVE_OUTBOUND_CAPACITY") {
            config.outbound_capacity = match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(InitiativeError::Config(format!(
                        "INITIATIVE_OUTBOUND_CAPACITY must be a positive integer, got {raw:?}"
                    )));
                }
            };
        }

        Ok(config)
    }
}
