//! Online users and their outbound channels.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use chatrelay_protocol::ServerMessage;
use chatrelay_transport::ConnectionId;
use tokio::sync::mpsc;

/// Channel sender for delivering server messages to one connection.
///
/// The connection's session owns the receiving end and writes each message
/// to the socket in the order it was sent.
pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

/// A live connection's presence entry.
///
/// Identity is the [`ConnectionId`] alone. Two users may share a display
/// name; they are still distinct users because they sit on different
/// connections.
#[derive(Debug, Clone)]
pub struct OnlineUser {
    display_name: String,
    connection_id: ConnectionId,
    outbound: OutboundSender,
}

impl OnlineUser {
    pub(crate) fn new(
        display_name: String,
        connection_id: ConnectionId,
        outbound: OutboundSender,
    ) -> Self {
        Self {
            display_name,
            connection_id,
            outbound,
        }
    }

    /// The name this user connected with.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Queues a message for this user's connection. Silently drops it if
    /// the session is already gone; its pending disconnect will clean up.
    pub(crate) fn deliver(&self, msg: ServerMessage) {
        if self.outbound.send(msg).is_err() {
            tracing::trace!(
                conn_id = %self.connection_id,
                "outbound channel closed, message dropped"
            );
        }
    }
}

impl PartialEq for OnlineUser {
    fn eq(&self, other: &Self) -> bool {
        self.connection_id == other.connection_id
    }
}

impl Eq for OnlineUser {}

impl Hash for OnlineUser {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.connection_id.hash(state);
    }
}

impl PartialOrd for OnlineUser {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OnlineUser {
    fn cmp(&self, other: &Self) -> Ordering {
        self.connection_id.cmp(&other.connection_id)
    }
}
