//! Error types for the protocol layer.
//!
//! Each crate in Matchpoint defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in reading or writing JSON,
//! not in networking or session handling.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into a string).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning a string into a Rust type).
    ///
    /// Common causes: a corrupted stored record, or a server payload
    /// whose fields have the wrong types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The payload parsed as JSON but doesn't have the shape we need,
    /// e.g. a login response without an access token.
    #[error("unexpected payload: {0}")]
    UnexpectedShape(String),
}
