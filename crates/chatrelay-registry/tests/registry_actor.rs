//! Integration tests for the registry actor and its handle.

use std::time::Duration;

use chatrelay_protocol::{ClientCommand, ServerMessage};
use chatrelay_registry::{RegistryConfig, RegistryError, RegistryHandle, spawn_registry};
use chatrelay_transport::ConnectionId;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

struct Peer {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerMessage>,
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

    async fn submit(&self, registry: &RegistryHandle, command: ClientCommand) {
        registry
            .submit(self.id, &self.tx, command)
            .await
            .expect("registry should be running");
    }

    async fn next(&mut self) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("channel closed")
    }

    /// Asserts nothing arrives once the registry has caught up.
    async fn assert_idle(&mut self, registry: &RegistryHandle) {
        // A snapshot round-trip guarantees earlier commands were applied.
        registry.snapshot().await.unwrap();
        assert!(self.rx.try_recv().is_err(), "unexpected message");
    }
}

fn config() -> RegistryConfig {
    RegistryConfig {
        rooms: vec!["room2".into(), "room1".into()],
        ..RegistryConfig::default()
    }
}

fn connect(name: &str) -> ClientCommand {
    ClientCommand::Connect {
        username: name.into(),
    }
}

fn users(names: &[&str]) -> ServerMessage {
    ServerMessage::Users {
        names: names.iter().map(|n| n.to_string()).collect(),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connect_round_trip_through_actor() {
    let registry = spawn_registry(config());
    let mut jim = Peer::new(1);

    jim.submit(&registry, connect("Jim")).await;

    assert_eq!(
        jim.next().await,
        ServerMessage::Rooms {
            names: vec!["room1".into(), "room2".into()],
        }
    );
    assert_eq!(jim.next().await, users(&["Jim"]));
}

#[tokio::test]
async fn test_snapshot_reflects_presence() {
    let registry = spawn_registry(config());
    let jim = Peer::new(1);
    let john = Peer::new(2);

    jim.submit(&registry, connect("Jim")).await;
    john.submit(&registry, connect("John")).await;

    let info = registry.snapshot().await.unwrap();
    assert_eq!(info.rooms, ["room1", "room2"]);
    assert_eq!(info.users, ["Jim", "John"]);
}

#[tokio::test]
async fn test_leave_acts_like_disconnect() {
    let registry = spawn_registry(config());
    let mut jim = Peer::new(1);
    let mut john = Peer::new(2);

    jim.submit(&registry, connect("Jim")).await;
    john.submit(&registry, connect("John")).await;
    jim.next().await; // rooms
    jim.next().await; // users [Jim]
    jim.next().await; // users [Jim, John]
    john.next().await; // rooms
    john.next().await; // users [Jim, John]

    registry.leave(jim.id).await.unwrap();

    assert_eq!(john.next().await, users(&["John"]));
    jim.assert_idle(&registry).await;
}

#[tokio::test]
async fn test_leave_after_explicit_disconnect_is_silent() {
    let registry = spawn_registry(config());
    let jim = Peer::new(1);
    let mut john = Peer::new(2);

    jim.submit(&registry, connect("Jim")).await;
    john.submit(&registry, connect("John")).await;
    john.next().await;
    john.next().await;

    jim.submit(&registry, ClientCommand::Disconnect).await;
    assert_eq!(john.next().await, users(&["John"]));

    registry.leave(jim.id).await.unwrap();
    john.assert_idle(&registry).await;
}

#[tokio::test]
async fn test_commands_from_one_connection_keep_order() {
    let registry = spawn_registry(config());
    let mut jim = Peer::new(1);

    jim.submit(&registry, connect("Jim")).await;
    for i in 0..50 {
        jim.submit(
            &registry,
            ClientCommand::Message {
                room: "room1".into(),
                text: i.to_string(),
            },
        )
        .await;
    }

    jim.next().await;
    jim.next().await;
    for i in 0..50 {
        match jim.next().await {
            ServerMessage::Message { text, .. } => assert_eq!(text, i.to_string()),
            other => panic!("expected Message, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_concurrent_connects_produce_consistent_presence() {
    let registry = spawn_registry(config());

    let mut tasks = Vec::new();
    for i in 0..20u64 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let peer = Peer::new(i + 1);
            peer.submit(&registry, connect(&format!("user{i:02}"))).await;
            peer
        }));
    }
    let mut peers = Vec::new();
    for t in tasks {
        peers.push(t.await.unwrap());
    }

    let info = registry.snapshot().await.unwrap();
    assert_eq!(info.users.len(), 20);

    // Every peer's last users list is the full, untorn set.
    for peer in &mut peers {
        let mut last = None;
        while let Ok(msg) = peer.rx.try_recv() {
            if let ServerMessage::Users { names } = msg {
                last = Some(names);
            }
        }
        assert_eq!(last.as_ref(), Some(&info.users));
    }
}

#[tokio::test]
async fn test_handle_fails_after_shutdown() {
    let registry = spawn_registry(config());
    registry.shutdown().await.unwrap();

    // The actor drops its receiver when it exits.
    let mut result = Ok(());
    for _ in 0..50 {
        result = registry.leave(ConnectionId::new(1)).await;
        if result.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(matches!(result, Err(RegistryError::Unavailable)));
}
