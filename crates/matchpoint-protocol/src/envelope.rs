//! The response envelope every Matchpoint endpoint returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{ success, data?, message?, error? }`: the server's standard wrapper.
///
/// Mock servers in tests build their bodies with [`ApiEnvelope::ok`] and
/// [`ApiEnvelope::failure`] so they speak exactly what the real backend
/// speaks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    /// Whether the server considers the call successful.
    #[serde(default)]
    pub success: bool,

    /// Operation-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Human-readable message, usually shown to the user verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Some endpoints report failures here instead of in `message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiEnvelope {
    /// A successful envelope carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Self::default()
        }
    }

    /// A failed envelope carrying a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Reads an envelope out of an arbitrary response body.
    ///
    /// Never fails: a body that isn't an object (empty, HTML error page,
    /// plain string) becomes an unsuccessful envelope. A plain string body
    /// is kept as the message.
    pub fn from_value(body: &Value) -> Self {
        match body {
            Value::Object(_) => {
                serde_json::from_value(body.clone()).unwrap_or_default()
            }
            Value::String(text) if !text.is_empty() => Self::failure(text.clone()),
            _ => Self::default(),
        }
    }

    /// The message to show the user: `message`, then `error`, then `fallback`.
    pub fn message_or(&self, fallback: &str) -> String {
        [self.message.as_deref(), self.error.as_deref()]
            .into_iter()
            .flatten()
            .find(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    /// The `data` payload, or `Value::Null` when absent.
    pub fn data_or_null(&self) -> &Value {
        self.data.as_ref().unwrap_or(&Value::Null)
    }
}
