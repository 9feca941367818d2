//! `InitiativeServer` builder and server loop.
//!
//! This is the entry point for running the tracker. It ties together all
//! the layers: transport → protocol → store → hub.

use std::sync::Arc;

use initiative_hub::Hub;
use initiative_protocol::{Codec, JsonCodec};
use initiative_store::GroupStore;
use initiative_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{InitiativeError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The store
/// and the hub each guard their own data.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) store: GroupStore,
    pub(crate) hub: Hub<C>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting an initiative server.
///
/// # Example
///
/// ```rust,no_run
/// use initiative::prelude::*;
///
/// # async fn run() -> Result<(), InitiativeError> {
/// let server = InitiativeServer::builder()
///     .bind("0.0.0.0:8080")
///     .outbound_capacity(32)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct InitiativeServerBuilder {
    config: ServerConfig,
}

impl InitiativeServerBuilder {
    /// Creates a new builder with default settings.
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

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the per-connection outbound queue size.
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_capacity = capacity;
        self
    }

    /// Sets how long a new connection may take to send `join`.
    pub fn join_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.join_timeout = timeout;
        self
    }

    /// Sets how long a connection may go without sending anything.
    /// See [`ServerConfig::idle_timeout`].
    pub fn idle_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`, which is what the
    /// browser client speaks.
    pub async fn build(self) -> Result<InitiativeServer<JsonCodec>, InitiativeError> {
        if self.config.outbound_capacity == 0 {
            return Err(InitiativeError::Config(
                "outbound capacity must be at least 1".into(),
            ));
        }

        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            store: GroupStore::new(),
            hub: Hub::with_codec(JsonCodec),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(InitiativeServer { transport, state })
    }
}

impl Default for InitiativeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running initiative server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct InitiativeServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl InitiativeServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> InitiativeServerBuilder {
        InitiativeServerBuilder::new()
    }
}

impl<C: Codec> InitiativeServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), InitiativeError> {
        tracing::info!(
            addr = %self.state.config.bind_addr,
            outbound_capacity = self.state.config.outbound_capacity,
            "initiative server running"
        );

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
