//! Wire protocol for chatrelay.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`ClientCommand`], [`ServerMessage`]): the two closed
//!   vocabularies, one per direction.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from frame payloads.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (ClientCommand / ServerMessage) → Registry
//! ```
//!
//! The protocol layer knows nothing about connections or users; it only
//! converts between bytes and typed messages.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{ClientCommand, ServerMessage};
