//! Unified error type for the Matchpoint client.

use matchpoint_protocol::ProtocolError;
use matchpoint_session::SessionError;
use matchpoint_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `matchpoint` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate. `?`
/// converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MatchpointError {
    /// No response from the server (connection, timeout, bad URL).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response or record that couldn't be read or written.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An auth or session failure, including server rejections.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MatchpointError {
    /// HTTP status of a server rejection, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Session(err) => err.status(),
            _ => None,
        }
    }
}
