//! # chatrelay
//!
//! A chat relay over length-prefixed TCP.
//!
//! Clients open a connection, announce a display name, and can then post
//! to named rooms or message one another privately. Every frame is a
//! 4-byte big-endian length followed by one JSON command; the server
//! tracks who is online and pushes presence updates to everyone.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatrelay::prelude::*;
//!
//! # async fn start() -> Result<(), ChatRelayError> {
//! let server = ChatServer::builder()
//!     .bind("127.0.0.1:9999")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod client;
mod error;
mod server;
mod session;

pub use client::ChatClient;
pub use error::ChatRelayError;
pub use server::{ChatServer, ChatServerBuilder, DEFAULT_BIND_ADDR};

/// Re-exports of the sub-crates for advanced use.
pub use chatrelay_protocol as protocol;
pub use chatrelay_registry as registry;
pub use chatrelay_transport as transport;

/// The types most programs need.
pub mod prelude {
    pub use crate::{ChatClient, ChatRelayError, ChatServer, ChatServerBuilder};
    pub use chatrelay_protocol::{ClientCommand, ServerMessage};
    pub use chatrelay_registry::{DEFAULT_ROOMS, RegistryHandle, RegistryInfo};
}
