//! Codec trait and implementations for storing records as strings.
//!
//! Key-value stores (the OS secure store, the session store) hold strings.
//! A "codec" converts between Rust types and those strings. The session
//! layer doesn't care HOW records are serialized: it just needs something
//! that implements [`Codec`].

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to strings and decode them back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between tasks (the session vault is
///   shared by the manager and the authorized HTTP client).
/// - `'static` → the codec owns everything it needs.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a string.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a string back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the string is malformed or
    /// doesn't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &str) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// The stored `user` key is JSON so that any client reading the same store
/// sees the record exactly as the server sent it.
///
/// ## Example
///
/// ```rust
/// use matchpoint_protocol::{Codec, JsonCodec, UserRecord};
///
/// let codec = JsonCodec;
/// let guest = UserRecord::guest();
///
/// let stored = codec.encode(&guest).unwrap();
/// let decoded: UserRecord = codec.decode(&stored).unwrap();
/// assert_eq!(guest, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(data).map_err(ProtocolError::Decode)
    }
}
