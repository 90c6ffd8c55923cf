//! `ChatServer` builder and accept loop.
//!
//! This is the entry point for running a relay. It ties the layers
//! together: transport → protocol → registry.

use std::sync::Arc;

use chatrelay_protocol::{Codec, JsonCodec};
use chatrelay_registry::{RegistryConfig, RegistryHandle, spawn_registry};
use chatrelay_transport::{FrameDecoder, Transport, TcpTransport};

use crate::ChatRelayError;
use crate::session::handle_connection;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:9999";

/// Shared server state passed to each session task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: RegistryHandle,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a chat server.
///
/// # Example
///
/// ```rust,no_run
/// use chatrelay::prelude::*;
///
/// # async fn start() -> Result<(), ChatRelayError> {
/// let server = ChatServer::builder()
///     .bind("0.0.0.0:9999")
///     .rooms(["Lobby", "Ops"])
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChatServerBuilder {
    bind_addr: String,
    registry_config: RegistryConfig,
    max_frame_len: usize,
}

impl ChatServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            registry_config: RegistryConfig::default(),
            max_frame_len: FrameDecoder::DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the advertised room names. Order doesn't matter; clients
    /// receive them sorted.
    pub fn rooms<I, S>(mut self, rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry_config.rooms = rooms.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the frame ceiling in bytes.
    pub fn max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Sets the capacity of the registry's command queue.
    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.registry_config.command_buffer = capacity;
        self
    }

    /// Binds the listener and starts the registry.
    ///
    /// # Errors
    /// Returns [`ChatRelayError::Transport`] if the address cannot be bound.
    /// Nothing is spawned in that case.
    pub async fn build(self) -> Result<ChatServer, ChatRelayError> {
        let transport = TcpTransport::bind(&self.bind_addr)
            .await?
            .with_max_frame_len(self.max_frame_len);

        let state = Arc::new(ServerState {
            registry: spawn_registry(self.registry_config),
            codec: JsonCodec,
        });

        Ok(ChatServer { transport, state })
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound chat server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ChatServer<C: Codec = JsonCodec> {
    transport: TcpTransport,
    state: Arc<ServerState<C>>,
}

impl ChatServer {
    /// Creates a new builder.
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }
}

impl<C: Codec> ChatServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle to the running registry.
    pub fn registry(&self) -> RegistryHandle {
        self.state.registry.clone()
    }

    /// Runs the accept loop.
    ///
    /// Spawns a session task for each accepted connection. Accept errors
    /// are logged and the loop keeps going; it only ends when the process
    /// does.
    pub async fn run(mut self) -> Result<(), ChatRelayError> {
        tracing::info!(addr = ?self.local_addr().ok(), "chat server running");

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
