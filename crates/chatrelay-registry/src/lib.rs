//! Presence tracking and message routing for chatrelay.
//!
//! The registry owns the set of online users and the advertised room
//! list, and decides who receives what. It runs as a single Tokio task
//! (actor model) so every command is applied under one serialization
//! point.
//!
//! # Key types
//!
//! - [`Registry`]: the synchronous state machine (testable without a runtime)
//! - [`spawn_registry`] / [`RegistryHandle`]: the actor and its handle
//! - [`OnlineUser`]: one connection's presence entry
//! - [`RegistryConfig`]: rooms and queue size

mod actor;
mod config;
mod error;
mod registry;
mod user;

pub use actor::{RegistryHandle, RegistryInfo, spawn_registry};
pub use config::{DEFAULT_ROOMS, RegistryConfig};
pub use error::RegistryError;
pub use registry::{DropReason, Outcome, Registry, display_order};
pub use user::{OnlineUser, OutboundSender};
