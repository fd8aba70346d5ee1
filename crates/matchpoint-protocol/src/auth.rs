//! Auth request bodies and the normalization of auth responses.
//!
//! The auth endpoints don't agree on one success shape. Depending on the
//! endpoint and the server version, a "you're in" response may put the
//! tokens inline or under `tokens`, may name the user `user` or `player`,
//! or may carry no tokens at all (email verified, please log in).
//!
//! Rather than probing optional fields at every call site, responses are
//! normalized here, once, into [`AuthPayload`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProtocolError, UserRecord};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// `POST <LOGIN>` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// First call to the registration endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub username: String,
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
}

/// `{email, otp}`: the OTP confirmation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpConfirmation {
    pub email: String,
    pub otp: String,
}

/// `{email}`: resend OTP, forgot password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// `{refreshToken}`: the refresh call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Completes a forgot-password flow with the emailed OTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

/// Changes the password of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// An access token and, usually, the refresh token that goes with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }

    /// Reads a token pair from a payload: inline, or nested under `tokens`.
    ///
    /// Empty access tokens count as absent.
    pub fn from_payload(data: &Value) -> Option<Self> {
        let source = data
            .get("tokens")
            .filter(|t| t.get("accessToken").is_some())
            .unwrap_or(data);

        let access_token = source.get("accessToken")?.as_str()?;
        if access_token.is_empty() {
            return None;
        }
        let refresh_token = source
            .get("refreshToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Some(Self::new(access_token, refresh_token))
    }
}

// ---------------------------------------------------------------------------
// AuthPayload
// ---------------------------------------------------------------------------

/// The normalized meaning of a successful auth response.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthPayload {
    /// The server issued tokens: the caller is now logged in.
    /// `user` is `None` when the server left it out and it must be fetched.
    Session {
        tokens: TokenPair,
        user: Option<UserRecord>,
    },

    /// The server accepted the request but issued no tokens
    /// (e.g. email verified, go log in).
    Verified { user: Option<UserRecord> },
}

impl AuthPayload {
    /// Normalizes a response `data` payload.
    ///
    /// # Errors
    /// Returns `ProtocolError::UnexpectedShape` if `data` isn't an object.
    pub fn from_data(data: &Value) -> Result<Self, ProtocolError> {
        if !data.is_object() {
            return Err(ProtocolError::UnexpectedShape(format!(
                "expected an object payload, got {}",
                kind_of(data)
            )));
        }

        let user = UserRecord::from_payload(data);
        Ok(match TokenPair::from_payload(data) {
            Some(tokens) => Self::Session { tokens, user },
            None => Self::Verified { user },
        })
    }

    /// Like [`from_data`](Self::from_data), but insists on tokens.
    ///
    /// # Errors
    /// Returns `ProtocolError::UnexpectedShape` if no access token is present.
    pub fn session_from_data(
        data: &Value,
    ) -> Result<(TokenPair, Option<UserRecord>), ProtocolError> {
        match Self::from_data(data)? {
            Self::Session { tokens, user } => Ok((tokens, user)),
            Self::Verified { .. } => Err(ProtocolError::UnexpectedShape(
                "response carries no access token".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// ConflictKind
// ---------------------------------------------------------------------------

/// What a `409` from the registration endpoint means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The account exists but was never verified: resume OTP verification.
    ResumeVerification,
    /// The account exists and is verified: the user should log in instead.
    AlreadyVerified,
}

impl ConflictKind {
    /// Classifies a `409` body by its markers, looking at the top level
    /// and inside `data`. Anything without an "unverified" marker is
    /// treated as already verified.
    pub fn from_body(body: &Value) -> Self {
        let scopes = [Some(body), body.get("data")];
        let unverified = scopes.into_iter().flatten().any(|scope| {
            scope.get("requiresVerification") == Some(&Value::Bool(true))
                || scope.get("isVerified") == Some(&Value::Bool(false))
                || scope.get("verified") == Some(&Value::Bool(false))
        });

        if unverified {
            Self::ResumeVerification
        } else {
            Self::AlreadyVerified
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
