//! Registry actor: a single Tokio task that owns the [`Registry`].
//!
//! Sessions never touch registry state. They send commands through a
//! bounded mpsc channel and receive outbound messages on their own
//! unbounded channel. The task processes one command at a time, which is
//! the single serialization point for all shared state.

use chatrelay_protocol::ClientCommand;
use chatrelay_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::{OutboundSender, Registry, RegistryConfig, RegistryError};

/// Commands sent to the registry actor through its channel.
pub(crate) enum RegistryCommand {
    /// A decoded client command, in wire order for its connection.
    Submit {
        connection: ConnectionId,
        outbound: OutboundSender,
        command: ClientCommand,
    },

    /// The connection is gone. Equivalent to a `disconnect` command.
    Leave { connection: ConnectionId },

    /// Request a snapshot of rooms and users.
    Snapshot { reply: oneshot::Sender<RegistryInfo> },

    /// Stop the actor.
    Shutdown,
}

/// A snapshot of registry contents, both lists sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryInfo {
    pub rooms: Vec<String>,
    pub users: Vec<String>,
}

/// Handle to the running registry actor.
///
/// Cheap to clone; every session holds one.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Submits one command on behalf of `connection`.
    ///
    /// Commands submitted by one caller are processed in submission order.
    /// Waits if the registry's queue is full.
    pub async fn submit(
        &self,
        connection: ConnectionId,
        outbound: &OutboundSender,
        command: ClientCommand,
    ) -> Result<(), RegistryError> {
        self.send(RegistryCommand::Submit {
            connection,
            outbound: outbound.clone(),
            command,
        })
        .await
    }

    /// Reports that `connection` has closed.
    pub async fn leave(&self, connection: ConnectionId) -> Result<(), RegistryError> {
        self.send(RegistryCommand::Leave { connection }).await
    }

    /// Requests the current rooms and users.
    pub async fn snapshot(&self) -> Result<RegistryInfo, RegistryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RegistryCommand::Snapshot { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| RegistryError::Unavailable)
    }

    /// Tells the registry to stop.
    pub async fn shutdown(&self) -> Result<(), RegistryError> {
        self.send(RegistryCommand::Shutdown).await
    }

    async fn send(&self, cmd: RegistryCommand) -> Result<(), RegistryError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RegistryError::Unavailable)
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct RegistryActor {
    registry: Registry,
    receiver: mpsc::Receiver<RegistryCommand>,
}

impl RegistryActor {
    /// Runs the actor loop, processing commands until shutdown or until
    /// every handle has been dropped.
    async fn run(mut self) {
        tracing::info!(rooms = ?self.registry.rooms(), "registry started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RegistryCommand::Submit {
                    connection,
                    outbound,
                    command,
                } => {
                    let name = command.command_name();
                    let outcome = self.registry.apply(connection, &outbound, command);
                    tracing::debug!(
                        conn_id = %connection,
                        command = name,
                        ?outcome,
                        "command applied"
                    );
                }
                RegistryCommand::Leave { connection } => {
                    let outcome = self.registry.disconnect(connection);
                    tracing::debug!(conn_id = %connection, ?outcome, "connection left");
                }
                RegistryCommand::Snapshot { reply } => {
                    let _ = reply.send(RegistryInfo {
                        rooms: self.registry.rooms(),
                        users: self.registry.users(),
                    });
                }
                RegistryCommand::Shutdown => {
                    tracing::info!("registry shutting down");
                    break;
                }
            }
        }

        tracing::info!(
            online = self.registry.online_count(),
            "registry stopped"
        );
    }
}

/// Spawns the registry actor task and returns a handle to it.
///
/// `config.command_buffer` bounds the command queue; submitters wait when
/// it is full.
pub fn spawn_registry(config: RegistryConfig) -> RegistryHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let actor = RegistryActor {
        registry: Registry::new(config.rooms),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RegistryHandle { sender: tx }
}
