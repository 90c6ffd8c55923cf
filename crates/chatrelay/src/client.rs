//! A minimal relay client.
//!
//! Speaks the same framed JSON as the server. Handy as a scripted front
//! end and as the harness for end-to-end tests: send commands, then wait
//! for an exact number of replies or assert that none arrive.

use std::time::Duration;

use chatrelay_protocol::{ClientCommand, Codec, JsonCodec, ServerMessage};
use chatrelay_transport::{Connection, ConnectionId, TcpConnection, TransportError};
use tokio::net::ToSocketAddrs;
use tokio::time::{Instant, timeout, timeout_at};

use crate::ChatRelayError;

/// A client connection to a chat relay.
pub struct ChatClient {
    conn: TcpConnection,
    codec: JsonCodec,
}

impl ChatClient {
    /// Opens a connection to the relay at `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ChatRelayError> {
        let conn = TcpConnection::connect(addr).await?;
        tracing::debug!(id = %conn.id(), peer = %conn.peer_addr(), "client connected");
        Ok(Self {
            conn,
            codec: JsonCodec,
        })
    }

    /// The local identifier of this connection.
    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Sends one command.
    pub async fn send(&self, command: &ClientCommand) -> Result<(), ChatRelayError> {
        let bytes = self.codec.encode(command)?;
        self.send_raw(&bytes).await
    }

    /// Sends an arbitrary payload as one frame, bypassing the codec.
    pub async fn send_raw(&self, payload: &[u8]) -> Result<(), ChatRelayError> {
        self.conn.send(payload).await?;
        Ok(())
    }

    /// Waits for the next server message.
    ///
    /// Returns `Ok(None)` once the server has closed the connection.
    pub async fn recv(&self) -> Result<Option<ServerMessage>, ChatRelayError> {
        match self.conn.recv().await? {
            Some(payload) => Ok(Some(self.codec.decode(&payload)?)),
            None => Ok(None),
        }
    }

    /// Collects exactly `count` messages, all of which must arrive within
    /// `wait`.
    ///
    /// # Errors
    /// [`ChatRelayError::Timeout`] if the window expires first;
    /// [`TransportError::ConnectionClosed`] if the server hangs up first.
    pub async fn expect(
        &self,
        count: usize,
        wait: Duration,
    ) -> Result<Vec<ServerMessage>, ChatRelayError> {
        let deadline = Instant::now() + wait;
        let mut messages = Vec::with_capacity(count);
        while messages.len() < count {
            match timeout_at(deadline, self.recv()).await {
                Ok(Ok(Some(message))) => messages.push(message),
                Ok(Ok(None)) => {
                    return Err(TransportError::ConnectionClosed(format!(
                        "server closed after {} of {count} messages",
                        messages.len()
                    ))
                    .into());
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(ChatRelayError::Timeout),
            }
        }
        Ok(messages)
    }

    /// Succeeds if no message arrives within `window`.
    ///
    /// A server-side close counts as silence.
    pub async fn expect_nothing(&self, window: Duration) -> Result<(), ChatRelayError> {
        match timeout(window, self.recv()).await {
            Err(_) | Ok(Ok(None)) => Ok(()),
            Ok(Ok(Some(message))) => Err(ChatRelayError::Unexpected(Box::new(message))),
            Ok(Err(e)) => Err(e),
        }
    }

    /// Closes the sending side. The server sees a peer close.
    pub async fn close(&self) -> Result<(), ChatRelayError> {
        self.conn.close().await?;
        Ok(())
    }
}
