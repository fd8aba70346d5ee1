//! Wire types for the Matchpoint tournament API.
//!
//! This crate defines the shapes that travel between the client and the
//! REST backend:
//!
//! - **Envelope** ([`ApiEnvelope`]): the `{ success, data, message, error }`
//!   wrapper every endpoint responds with.
//! - **Users** ([`UserRecord`], [`UserType`]): the profile record the
//!   server produces and the client caches.
//! - **Auth payloads** ([`AuthPayload`], [`TokenPair`], request bodies):
//!   login/registration/OTP shapes, normalized at the boundary.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how records are turned
//!   into strings for key-value storage.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer knows nothing about HTTP or sessions. It only knows
//! how to read and write the JSON the server speaks.
//!
//! ```text
//! Transport (HTTP) → Protocol (envelopes, payloads) → Session (tokens, user)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod auth;
mod codec;
mod envelope;
mod error;
mod user;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use auth::{
    AuthPayload, ConflictKind, Credentials, EmailRequest, OtpConfirmation,
    PasswordChange, PasswordReset, RefreshRequest, RegistrationRequest,
    TokenPair,
};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use envelope::ApiEnvelope;
pub use error::ProtocolError;
pub use user::{UserRecord, UserType};
