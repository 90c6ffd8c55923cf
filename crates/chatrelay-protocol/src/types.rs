//! The two message vocabularies that travel on the wire.
//!
//! Every payload is a JSON object with exactly two top-level fields:
//!
//! ```text
//! { "command": "<name>", "data": <variant payload> }
//! ```
//!
//! `data` is omitted for variants that carry nothing (`disconnect`,
//! `disconnected`). An inbound `disconnect` may still carry `data`; it is
//! ignored. The command names are case-exact and the set is
//! closed: an unknown name is a decode error, never a fallback variant.
//!
//! ## The `{from, to, text}` record
//!
//! `message` and `privateMessage` reuse one record shape in both
//! directions, but the fields do not mean the same thing everywhere:
//!
//! | direction | command          | `from`          | `to`            |
//! |-----------|------------------|-----------------|-----------------|
//! | client →  | `message`        | ignored, unset  | room name       |
//! | client →  | `privateMessage` | ignored, unset  | target username |
//! | → client  | `message`        | sender username | room name       |
//! | → client  | `privateMessage` | sender username | target username |
//!
//! The public enums name these fields by meaning (`room`,
//! `to_username`, ...). The private `*Frame` enums below are the wire
//! table; the `From` impls between the two are the only place the
//! mapping is written down, and they are exhaustive matches.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// ClientCommand
// ---------------------------------------------------------------------------

/// A command sent by a client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ClientFrame", from = "ClientFrame")]
pub enum ClientCommand {
    /// Register this connection under a display name.
    Connect { username: String },

    /// Leave the chat. The connection itself stays open.
    Disconnect,

    /// Post `text` to `room`. Broadcast to every online user.
    Message { room: String, text: String },

    /// Send `text` to one user, addressed by display name.
    PrivateMessage { to_username: String, text: String },
}

impl ClientCommand {
    /// The exact wire name of this command.
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect => "disconnect",
            Self::Message { .. } => "message",
            Self::PrivateMessage { .. } => "privateMessage",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// A message sent by the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ServerFrame", from = "ServerFrame")]
pub enum ServerMessage {
    /// Connection established with the named server.
    Connected { server_name: String },

    /// Connection ended.
    Disconnected,

    /// The rooms this server advertises, sorted by name.
    Rooms { names: Vec<String> },

    /// Display names of every online user, sorted.
    Users { names: Vec<String> },

    /// A room message, delivered to every online user.
    Message {
        room: String,
        from_username: String,
        text: String,
    },

    /// A private message, delivered to the target and echoed to the sender.
    PrivateMessage {
        from_username: String,
        to_username: String,
        text: String,
    },
}

impl ServerMessage {
    /// The exact wire name of this message.
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected => "disconnected",
            Self::Rooms { .. } => "rooms",
            Self::Users { .. } => "users",
            Self::Message { .. } => "message",
            Self::PrivateMessage { .. } => "privateMessage",
        }
    }
}

// ---------------------------------------------------------------------------
// Wire representation
// ---------------------------------------------------------------------------

/// `data` of a client `message` / `privateMessage`.
#[derive(Debug, Serialize, Deserialize)]
struct OutgoingText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    to: String,
    text: String,
}

/// `data` of a server `message` / `privateMessage`.
#[derive(Debug, Serialize, Deserialize)]
struct RelayedText {
    from: String,
    to: String,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "camelCase")]
enum ClientFrame {
    Connect(String),
    #[serde(deserialize_with = "ignore_data")]
    Disconnect,
    Message(OutgoingText),
    PrivateMessage(OutgoingText),
}

/// Accepts and discards whatever `data` a client sent with `disconnect`.
fn ignore_data<'de, D: Deserializer<'de>>(deserializer: D) -> Result<(), D::Error> {
    IgnoredAny::deserialize(deserializer).map(|_| ())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "camelCase")]
enum ServerFrame {
    Connected(String),
    Disconnected,
    Rooms(Vec<String>),
    Users(Vec<String>),
    Message(RelayedText),
    PrivateMessage(RelayedText),
}

impl From<ClientCommand> for ClientFrame {
    fn from(cmd: ClientCommand) -> Self {
        match cmd {
            ClientCommand::Connect { username } => Self::Connect(username),
            ClientCommand::Disconnect => Self::Disconnect,
            ClientCommand::Message { room, text } => Self::Message(OutgoingText {
                from: None,
                to: room,
                text,
            }),
            ClientCommand::PrivateMessage { to_username, text } => {
                Self::PrivateMessage(OutgoingText {
                    from: None,
                    to: to_username,
                    text,
                })
            }
        }
    }
}

impl From<ClientFrame> for ClientCommand {
    fn from(frame: ClientFrame) -> Self {
        // `from` on inbound text is client-supplied and never trusted.
        match frame {
            ClientFrame::Connect(username) => Self::Connect { username },
            ClientFrame::Disconnect => Self::Disconnect,
            ClientFrame::Message(OutgoingText { to, text, .. }) => Self::Message { room: to, text },
            ClientFrame::PrivateMessage(OutgoingText { to, text, .. }) => Self::PrivateMessage {
                to_username: to,
                text,
            },
        }
    }
}

impl From<ServerMessage> for ServerFrame {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Connected { server_name } => Self::Connected(server_name),
            ServerMessage::Disconnected => Self::Disconnected,
            ServerMessage::Rooms { names } => Self::Rooms(names),
            ServerMessage::Users { names } => Self::Users(names),
            ServerMessage::Message {
                room,
                from_username,
                text,
            } => Self::Message(RelayedText {
                from: from_username,
                to: room,
                text,
            }),
            ServerMessage::PrivateMessage {
                from_username,
                to_username,
                text,
            } => Self::PrivateMessage(RelayedText {
                from: from_username,
                to: to_username,
                text,
            }),
        }
    }
}

impl From<ServerFrame> for ServerMessage {
    fn from(frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::Connected(server_name) => Self::Connected { server_name },
            ServerFrame::Disconnected => Self::Disconnected,
            ServerFrame::Rooms(names) => Self::Rooms { names },
            ServerFrame::Users(names) => Self::Users { names },
            ServerFrame::Message(RelayedText { from, to, text }) => Self::Message {
                room: to,
                from_username: from,
                text,
            },
            ServerFrame::PrivateMessage(RelayedText { from, to, text }) => Self::PrivateMessage {
                from_username: from,
                to_username: to,
                text,
            },
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
