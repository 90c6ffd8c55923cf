//! Unified error type for chatrelay.

use chatrelay_protocol::{ProtocolError, ServerMessage};
use chatrelay_registry::RegistryError;
use chatrelay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ChatRelayError {
    /// A transport-level error (bind, framing, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The registry task is gone.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No server message arrived within the client's wait window.
    #[error("timed out waiting for a server message")]
    Timeout,

    /// A server message arrived where the client expected silence.
    #[error("unexpected server message: {0:?}")]
    Unexpected(Box<ServerMessage>),
}
