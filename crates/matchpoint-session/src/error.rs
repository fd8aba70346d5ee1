//! Error types for the session layer.
//!
//! The `Display` text of a [`SessionError`] is the message a screen shows
//! the user; it is also what ends up in `Session::last_error`.

use matchpoint_protocol::{ApiEnvelope, ProtocolError};
use matchpoint_transport::{ApiResponse, TransportError};

/// Errors returned by `SessionManager` operations.
///
/// None of these are fatal to the process: every operation can be retried
/// by the caller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The request never got a response. Never clears the session by itself.
    #[error("No response from server. Please check your connection.")]
    Network(#[source] TransportError),

    /// The server answered with a failure (non-2xx or `success: false`).
    /// `message` is the server's own message, or a generic fallback.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// OTP verification got a `404`: the pending registration is gone.
    #[error("Registration expired. Please start registration again.")]
    RegistrationExpired,

    /// Registration got a `409` for an already verified account.
    #[error("This email is already registered. Please log in instead.")]
    AlreadyRegistered,

    /// The operation needs an access token and there is none.
    #[error("You need to be logged in to do that.")]
    Unauthenticated,

    /// Exchanging the refresh token failed; the session has been cleared.
    #[error("Your session has expired. Please log in again. ({0})")]
    RefreshFailed(String),

    /// Another auth operation is still running.
    #[error("Another {0} is already in progress.")]
    OperationInProgress(&'static str),

    /// The server answered successfully but not in a shape we understand.
    #[error("Unexpected response from server: {0}")]
    UnexpectedResponse(#[from] ProtocolError),

    /// Reading or writing a key-value store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl SessionError {
    /// `true` for the "start registration again" case.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::RegistrationExpired)
    }

    /// HTTP status of a server rejection, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// A rejection carrying the server's message, or `fallback` if the
    /// body has none.
    pub fn rejected(response: &ApiResponse, fallback: &str) -> Self {
        Self::Rejected {
            status: response.status,
            message: ApiEnvelope::from_value(&response.body).message_or(fallback),
        }
    }
}

/// The envelope of a successful response: 2xx and `success: true`.
///
/// # Errors
/// Anything else is [`SessionError::Rejected`].
pub fn accept_envelope(response: &ApiResponse, fallback: &str) -> Result<ApiEnvelope, SessionError> {
    let envelope = ApiEnvelope::from_value(&response.body);
    if response.is_success() && envelope.success {
        Ok(envelope)
    } else {
        Err(SessionError::Rejected {
            status: response.status,
            message: envelope.message_or(fallback),
        })
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        Self::Network(err)
    }
}

/// Errors from a [`KeyValueStore`](crate::KeyValueStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing file couldn't be read or written.
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing data exists but can't be parsed.
    #[error("store is corrupt: {0}")]
    Corrupt(String),
}
