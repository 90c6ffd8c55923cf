//! Per-connection session: read frames, decode commands, hand them to the
//! registry, and write whatever the registry routes back.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`], plus a writer task draining the connection's
//! outbound queue. The flow is:
//!   1. Create the outbound queue and spawn the writer
//!   2. Loop: receive frame → decode → submit to the registry
//!   3. On close or failure, tell the registry the connection left

use std::sync::Arc;

use chatrelay_protocol::{ClientCommand, Codec, ServerMessage};
use chatrelay_registry::{OutboundSender, RegistryHandle};
use chatrelay_transport::{Connection, ConnectionId, TcpConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ChatRelayError;
use crate::server::ServerState;

/// Drop guard that reports the connection as gone when the session exits.
///
/// Fires on every exit path, including panics, so the registry always
/// sees exactly one leave per connection. The registry ignores a leave
/// for a connection that already disconnected explicitly.
struct LeaveGuard {
    conn_id: ConnectionId,
    registry: RegistryHandle,
}

impl Drop for LeaveGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let registry = self.registry.clone();
        tokio::spawn(async move {
            if let Err(e) = registry.leave(conn_id).await {
                tracing::debug!(%conn_id, error = %e, "leave not delivered");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: TcpConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), ChatRelayError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        Arc::clone(&state),
        outbound_rx,
    ));
    let guard = LeaveGuard {
        conn_id,
        registry: state.registry.clone(),
    };

    // The writer only finishes early if a send failed; the read loop holds
    // a sender, so the queue can't close under it.
    let mut writer_done = false;
    let result = tokio::select! {
        result = read_loop(&conn, &state, &outbound) => result,
        _ = &mut writer => {
            writer_done = true;
            tracing::debug!(%conn_id, "write side failed, ending session");
            Ok(())
        }
    };

    // Once the registry drops this user, the last sender goes away and
    // the writer drains what is left, then exits.
    drop(outbound);
    drop(guard);
    if !writer_done {
        finish_writer(conn_id, writer).await;
    }

    if let Err(e) = conn.close().await {
        tracing::trace!(%conn_id, error = %e, "close after session end");
    }
    tracing::debug!(%conn_id, "session ended");
    result
}

async fn finish_writer(conn_id: ConnectionId, writer: JoinHandle<()>) {
    if let Err(e) = writer.await {
        tracing::warn!(%conn_id, error = %e, "writer task failed");
    }
}

/// Reads frames until the peer goes away or violates framing.
async fn read_loop<C: Codec>(
    conn: &TcpConnection,
    state: &ServerState<C>,
    outbound: &OutboundSender,
) -> Result<(), ChatRelayError> {
    let conn_id = conn.id();
    // Who we are talking to, for logs: the peer address until a connect
    // command names the user.
    let mut source = conn.peer_addr().to_string();

    loop {
        let payload = match conn.recv().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::info!(%conn_id, %source, "connection closed by peer");
                return Ok(());
            }
            Err(e) if e.is_framing() => {
                tracing::warn!(%conn_id, %source, error = %e, "framing violation, closing");
                return Err(e.into());
            }
            Err(e) => {
                tracing::debug!(%conn_id, %source, error = %e, "recv error");
                return Err(e.into());
            }
        };

        tracing::trace!(
            %conn_id,
            payload = %String::from_utf8_lossy(&payload),
            "[INCOMING]"
        );

        let command: ClientCommand = match state.codec.decode(&payload) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(%conn_id, %source, error = %e, "dropping undecodable frame");
                continue;
            }
        };

        if let ClientCommand::Connect { username } = &command {
            source.clone_from(username);
        }
        tracing::debug!(%conn_id, %source, command = command.command_name(), "received command");

        state.registry.submit(conn_id, outbound, command).await?;
    }
}

/// Drains the outbound queue onto the connection in enqueue order.
async fn write_loop<C: Codec>(
    conn: Arc<TcpConnection>,
    state: Arc<ServerState<C>>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
) {
    let conn_id = conn.id();

    while let Some(message) = outbound.recv().await {
        let bytes = match state.codec.encode(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%conn_id, error = %e, "failed to encode server message");
                continue;
            }
        };

        tracing::trace!(
            %conn_id,
            payload = %String::from_utf8_lossy(&bytes),
            "[OUTGOING]"
        );

        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed");
            return;
        }
    }
}
