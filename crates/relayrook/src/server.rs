//! `RelayServer` builder and accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;

use relayrook_room::RoomRegistry;

use crate::handler::handle_connection;
use crate::{ServerConfig, ServerError};

/// Wire protocol version. A client hello carrying anything else is
/// turned away.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Server build version, reported in the server hello.
pub const SERVER_VERSION: &str = "0.1";

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) rooms: RoomRegistry,
}

/// Builder for configuring and starting a relay server.
pub struct RelayServerBuilder {
    config: ServerConfig,
}

impl RelayServerBuilder {
    /// Creates a builder with the stock configuration.
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

    /// Sets the interface to bind.
    pub fn host(mut self, host: &str) -> Self {
        self.config.host = host.to_string();
        self
    }

    /// Sets the port to listen on.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build(self) -> Result<RelayServer, ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let state = Arc::new(ServerState {
            rooms: RoomRegistry::new(),
        });
        Ok(RelayServer { listener, state })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay server. Call [`run()`](Self::run) to start accepting
/// connections.
pub struct RelayServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl RelayServer {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Every accepted connection gets its own handler task for the
    /// handshake and room join; a failed accept is logged and the loop
    /// keeps going. Runs until the process is terminated.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.listener.local_addr()?, "relay server running");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, state).await {
                            tracing::debug!(
                                %peer,
                                error = %e,
                                "connection ended with error"
                            );
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
