//! Error types for the protocol layer.

/// Errors that can occur while converting messages to and from bytes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Covers malformed JSON, an unknown `command` name, and missing or
    /// mistyped `data`. Recoverable: the frame is dropped and the
    /// connection stays open.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
