//! The presence and routing state machine.
//!
//! [`Registry`] is plain synchronous state: the online-user set, the room
//! list, and the rules that turn one [`ClientCommand`] into state changes
//! and outbound messages. It is NOT thread-safe by itself. It is owned by
//! exactly one task (see [`spawn_registry`](crate::spawn_registry)), which
//! gives every command mutual exclusion against every other command and
//! makes each fan-out complete before the next command is looked at.
//!
//! | Command            | Needs                        | Emits                                  |
//! |--------------------|------------------------------|----------------------------------------|
//! | `connect`          | connection not yet online    | `rooms` to it, then `users` to all     |
//! | `disconnect`       | connection online            | `users` to everyone remaining          |
//! | `message`          | sender online                | `message` to all, sender included      |
//! | `privateMessage`   | sender and target online     | `privateMessage` to target and sender  |
//!
//! A command whose precondition fails is dropped without any reply.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chatrelay_protocol::{ClientCommand, ServerMessage};
use chatrelay_transport::ConnectionId;

use crate::{OnlineUser, OutboundSender};

/// What happened when a command was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new user went online.
    Connected,
    /// A user went offline.
    Disconnected,
    /// A room message reached this many connections.
    Broadcast { recipients: usize },
    /// A private message reached its target (and the sender).
    Delivered,
    /// The command was ignored.
    Dropped(DropReason),
}

/// Why a command was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The connection has not sent `connect`, or already left.
    NotConnected,
    /// The connection is already online under some name.
    AlreadyConnected,
    /// No online user has the addressed display name.
    UnknownRecipient,
}

/// Online users and advertised rooms.
#[derive(Debug)]
pub struct Registry {
    /// Sorted once at construction; the list never changes afterwards.
    rooms: Vec<String>,
    /// Keyed by connection, so iteration follows connection order.
    online: BTreeMap<ConnectionId, OnlineUser>,
}

impl Registry {
    /// Creates an empty registry advertising `rooms`.
    pub fn new<I, S>(rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rooms: Vec<String> = rooms.into_iter().map(Into::into).collect();
        rooms.sort_by(|a, b| display_order(a, b));
        Self {
            rooms,
            online: BTreeMap::new(),
        }
    }

    /// Applies one command submitted by `connection`.
    ///
    /// `outbound` is the connection's own delivery channel; it is only
    /// retained when the command is a successful `connect`.
    pub fn apply(
        &mut self,
        connection: ConnectionId,
        outbound: &OutboundSender,
        command: ClientCommand,
    ) -> Outcome {
        match command {
            ClientCommand::Connect { username } => {
                self.connect(connection, username, outbound.clone())
            }
            ClientCommand::Disconnect => self.disconnect(connection),
            ClientCommand::Message { room, text } => self.message(connection, room, text),
            ClientCommand::PrivateMessage { to_username, text } => {
                self.private_message(connection, &to_username, text)
            }
        }
    }

    /// Puts `connection` online as `username`.
    ///
    /// The new connection gets the room list first, then every online
    /// connection (the new one included) gets the updated user list.
    pub fn connect(
        &mut self,
        connection: ConnectionId,
        username: String,
        outbound: OutboundSender,
    ) -> Outcome {
        if self.online.contains_key(&connection) {
            return Outcome::Dropped(DropReason::AlreadyConnected);
        }

        let user = OnlineUser::new(username, connection, outbound);
        tracing::info!(
            conn_id = %connection,
            username = user.display_name(),
            online = self.online.len() + 1,
            "user connected"
        );
        user.deliver(ServerMessage::Rooms {
            names: self.rooms(),
        });
        self.online.insert(connection, user);
        self.broadcast_users();
        Outcome::Connected
    }

    /// Takes `connection` offline and tells everyone who remains.
    ///
    /// Safe to call for connections that were never online; that is what
    /// happens when a session ends after an explicit `disconnect`.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Outcome {
        let Some(user) = self.online.remove(&connection) else {
            return Outcome::Dropped(DropReason::NotConnected);
        };
        tracing::info!(
            conn_id = %connection,
            username = user.display_name(),
            online = self.online.len(),
            "user disconnected"
        );
        self.broadcast_users();
        Outcome::Disconnected
    }

    /// Broadcasts a room message from `connection` to every online user.
    ///
    /// The room is not checked against the advertised list.
    pub fn message(&mut self, connection: ConnectionId, room: String, text: String) -> Outcome {
        let Some(sender) = self.online.get(&connection) else {
            return Outcome::Dropped(DropReason::NotConnected);
        };
        let msg = ServerMessage::Message {
            room,
            from_username: sender.display_name().to_string(),
            text,
        };
        for user in self.online.values() {
            user.deliver(msg.clone());
        }
        Outcome::Broadcast {
            recipients: self.online.len(),
        }
    }

    /// Sends a private message to the first online user named `to`, and
    /// echoes it back to the sender. A message to oneself therefore
    /// arrives twice.
    pub fn private_message(&mut self, connection: ConnectionId, to: &str, text: String) -> Outcome {
        let Some(sender) = self.online.get(&connection) else {
            return Outcome::Dropped(DropReason::NotConnected);
        };
        let Some(target) = self.online.values().find(|u| u.display_name() == to) else {
            return Outcome::Dropped(DropReason::UnknownRecipient);
        };

        let msg = ServerMessage::PrivateMessage {
            from_username: sender.display_name().to_string(),
            to_username: target.display_name().to_string(),
            text,
        };
        target.deliver(msg.clone());
        sender.deliver(msg);
        Outcome::Delivered
    }

    /// Advertised room names, sorted.
    pub fn rooms(&self) -> Vec<String> {
        self.rooms.clone()
    }

    /// Display names of all online users, sorted. Duplicates are kept.
    pub fn users(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .online
            .values()
            .map(|u| u.display_name().to_string())
            .collect();
        names.sort_by(|a, b| display_order(a, b));
        names
    }

    /// Number of online users.
    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    /// Sends one snapshot of the user list to every online connection.
    fn broadcast_users(&self) {
        let msg = ServerMessage::Users {
            names: self.users(),
        };
        for user in self.online.values() {
            user.deliver(msg.clone());
        }
    }
}

/// Ordering used for every name list: case-insensitive first, with the
/// raw code points breaking ties so the result is total and stable.
pub fn display_order(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    /// One simulated connection: its id, its sender, and what it received.
    struct Peer {
        id: ConnectionId,
        tx: OutboundSender,
        rx: mpsc::UnboundedReceiver<ServerMessage>,
    }

    impl Peer {
        fn new(id: u64) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                id: ConnectionId::new(id),
                tx,
                rx,
            }
        }

        fn drain(&mut self) -> Vec<ServerMessage> {
            let mut out = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push(msg);
            }
            out
        }
    }

    fn registry() -> Registry {
        Registry::new(["room2", "room1"])
    }

    fn connect(reg: &mut Registry, peer: &Peer, name: &str) -> Outcome {
        reg.apply(
            peer.id,
            &peer.tx,
            ClientCommand::Connect {
                username: name.into(),
            },
        )
    }

    fn users(names: &[&str]) -> ServerMessage {
        ServerMessage::Users {
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn test_connect_sends_rooms_then_users() {
        let mut reg = registry();
        let mut jim = Peer::new(1);

        assert_eq!(connect(&mut reg, &jim, "Jim"), Outcome::Connected);
        assert_eq!(
            jim.drain(),
            vec![
                ServerMessage::Rooms {
                    names: vec!["room1".into(), "room2".into()],
                },
                users(&["Jim"]),
            ]
        );
    }

    #[test]
    fn test_second_connect_updates_everyone() {
        let mut reg = registry();
        let mut jim = Peer::new(1);
        let mut john = Peer::new(2);

        connect(&mut reg, &jim, "Jim");
        jim.drain();
        connect(&mut reg, &john, "John");

        assert_eq!(jim.drain(), vec![users(&["Jim", "John"])]);
        let johns = john.drain();
        assert_eq!(johns.len(), 2);
        assert!(matches!(johns[0], ServerMessage::Rooms { .. }));
        assert_eq!(johns[1], users(&["Jim", "John"]));
    }

    #[test]
    fn test_connect_twice_on_same_connection_is_dropped() {
        let mut reg = registry();
        let mut jim = Peer::new(1);
        connect(&mut reg, &jim, "Jim");
        jim.drain();

        assert_eq!(
            connect(&mut reg, &jim, "James"),
            Outcome::Dropped(DropReason::AlreadyConnected)
        );
        assert!(jim.drain().is_empty());
        assert_eq!(reg.users(), ["Jim"]);
    }

    #[test]
    fn test_disconnect_notifies_only_remaining() {
        let mut reg = registry();
        let mut jim = Peer::new(1);
        let mut john = Peer::new(2);
        connect(&mut reg, &jim, "Jim");
        connect(&mut reg, &john, "John");
        jim.drain();
        john.drain();

        let outcome = reg.apply(jim.id, &jim.tx, ClientCommand::Disconnect);
        assert_eq!(outcome, Outcome::Disconnected);
        assert_eq!(john.drain(), vec![users(&["John"])]);
        assert!(jim.drain().is_empty());
        assert_eq!(reg.online_count(), 1);
    }

    #[test]
    fn test_disconnect_when_offline_is_noop() {
        let mut reg = registry();
        let mut john = Peer::new(2);
        connect(&mut reg, &john, "John");
        john.drain();

        assert_eq!(
            reg.disconnect(ConnectionId::new(99)),
            Outcome::Dropped(DropReason::NotConnected)
        );
        assert!(john.drain().is_empty());
    }

    #[test]
    fn test_message_broadcasts_to_everyone_including_sender() {
        let mut reg = registry();
        let mut jim = Peer::new(1);
        let mut john = Peer::new(2);
        connect(&mut reg, &jim, "Jim");
        connect(&mut reg, &john, "John");
        jim.drain();
        john.drain();

        let outcome = reg.apply(
            jim.id,
            &jim.tx,
            ClientCommand::Message {
                room: "room1".into(),
                text: "Hello, world".into(),
            },
        );
        assert_eq!(outcome, Outcome::Broadcast { recipients: 2 });

        let expected = ServerMessage::Message {
            room: "room1".into(),
            from_username: "Jim".into(),
            text: "Hello, world".into(),
        };
        assert_eq!(jim.drain(), vec![expected.clone()]);
        assert_eq!(john.drain(), vec![expected]);
    }

    #[test]
    fn test_message_to_unadvertised_room_is_still_broadcast() {
        let mut reg = registry();
        let mut jim = Peer::new(1);
        connect(&mut reg, &jim, "Jim");
        jim.drain();

        reg.message(jim.id, "nowhere".into(), "x".into());
        assert_eq!(
            jim.drain(),
            vec![ServerMessage::Message {
                room: "nowhere".into(),
                from_username: "Jim".into(),
                text: "x".into(),
            }]
        );
    }

    #[test]
    fn test_message_without_connect_is_dropped() {
        let mut reg = registry();
        let mut jim = Peer::new(1);
        let stranger = Peer::new(2);
        connect(&mut reg, &jim, "Jim");
        jim.drain();

        let outcome = reg.apply(
            stranger.id,
            &stranger.tx,
            ClientCommand::Message {
                room: "room1".into(),
                text: "hi".into(),
            },
        );
        assert_eq!(outcome, Outcome::Dropped(DropReason::NotConnected));
        assert!(jim.drain().is_empty());
    }

    #[test]
    fn test_private_message_reaches_target_and_sender_only() {
        let mut reg = registry();
        let mut jim = Peer::new(1);
        let mut john = Peer::new(2);
        let mut jane = Peer::new(3);
        connect(&mut reg, &jim, "Jim");
        connect(&mut reg, &john, "John");
        connect(&mut reg, &jane, "Jane");
        jim.drain();
        john.drain();
        jane.drain();

        let outcome = reg.apply(
            jim.id,
            &jim.tx,
            ClientCommand::PrivateMessage {
                to_username: "John".into(),
                text: "Hi".into(),
            },
        );
        assert_eq!(outcome, Outcome::Delivered);

        let expected = ServerMessage::PrivateMessage {
            from_username: "Jim".into(),
            to_username: "John".into(),
            text: "Hi".into(),
        };
        assert_eq!(john.drain(), vec![expected.clone()]);
        assert_eq!(jim.drain(), vec![expected]);
        assert!(jane.drain().is_empty());
    }

    #[test]
    fn test_private_message_to_unknown_name_is_dropped() {
        let mut reg = registry();
        let mut jim = Peer::new(1);
        connect(&mut reg, &jim, "Jim");
        jim.drain();

        assert_eq!(
            reg.private_message(jim.id, "Nobody", "x".into()),
            Outcome::Dropped(DropReason::UnknownRecipient)
        );
        assert!(jim.drain().is_empty());
    }

    #[test]
    fn test_private_message_to_self_is_delivered_twice() {
        let mut reg = registry();
        let mut jim = Peer::new(1);
        connect(&mut reg, &jim, "Jim");
        jim.drain();

        assert_eq!(
            reg.private_message(jim.id, "Jim", "note to self".into()),
            Outcome::Delivered
        );
        let expected = ServerMessage::PrivateMessage {
            from_username: "Jim".into(),
            to_username: "Jim".into(),
            text: "note to self".into(),
        };
        assert_eq!(jim.drain(), vec![expected.clone(), expected]);
    }

    #[test]
    fn test_duplicate_names_coexist_and_first_connected_wins() {
        let mut reg = registry();
        let mut first = Peer::new(1);
        let mut second = Peer::new(2);
        let mut sender = Peer::new(3);
        connect(&mut reg, &first, "Sam");
        connect(&mut reg, &second, "Sam");
        connect(&mut reg, &sender, "Ann");
        first.drain();
        second.drain();
        sender.drain();

        assert_eq!(reg.users(), ["Ann", "Sam", "Sam"]);

        reg.private_message(sender.id, "Sam", "which one?".into());
        assert_eq!(first.drain().len(), 1);
        assert!(second.drain().is_empty());
    }

    #[test]
    fn test_lists_are_sorted_case_insensitively() {
        let mut reg = Registry::new(["beta", "Alpha", "gamma"]);
        assert_eq!(reg.rooms(), ["Alpha", "beta", "gamma"]);

        for (i, name) in ["zoe", "Bob", "alice"].iter().enumerate() {
            let peer = Peer::new(i as u64 + 1);
            connect(&mut reg, &peer, name);
        }
        assert_eq!(reg.users(), ["alice", "Bob", "zoe"]);
    }

    #[test]
    fn test_empty_room_list_is_advertised_as_empty() {
        let mut reg = Registry::new(Vec::<String>::new());
        let mut jim = Peer::new(1);
        connect(&mut reg, &jim, "Jim");
        assert_eq!(jim.drain()[0], ServerMessage::Rooms { names: vec![] });
    }

    #[test]
    fn test_display_order_ties_break_on_case() {
        assert_eq!(display_order("a", "A"), Ordering::Greater);
        assert_eq!(display_order("abc", "ABD"), Ordering::Less);
        assert_eq!(display_order("same", "same"), Ordering::Equal);
    }
}
