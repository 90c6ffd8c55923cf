//! Error types for the registry layer.

/// Errors that can occur when talking to the registry.
///
/// Command-level problems (a message from a connection that never sent
/// `connect`, a private message to an unknown name) are not errors: the
/// registry drops those commands silently. The only failure a caller can
/// observe is the registry task itself being gone.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry task has stopped and its command channel is closed.
    #[error("registry is unavailable")]
    Unavailable,
}
