//! Caller-facing inputs for registration and profile updates.

use matchpoint_protocol::RegistrationRequest;
use matchpoint_transport::FilePart;
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};

/// Form field the server reads an uploaded profile picture from.
pub const PROFILE_IMAGE_FIELD: &str = "profileImage";

/// What a new user fills in on the sign-up screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationProfile {
    pub email: String,
    pub password: String,
    pub name: String,
    pub username: String,
    /// Client-chosen account id. Generated when `None`.
    pub uid: Option<String>,
    pub mobile_number: Option<String>,
}

impl RegistrationProfile {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: name.into(),
            username: username.into(),
            uid: None,
            mobile_number: None,
        }
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    #[must_use]
    pub fn with_mobile_number(mut self, number: impl Into<String>) -> Self {
        self.mobile_number = Some(number.into());
        self
    }

    /// Builds the wire body, generating a `uid` if none was given.
    pub fn into_request(self) -> RegistrationRequest {
        RegistrationRequest {
            email: self.email,
            password: self.password,
            name: self.name,
            username: self.username,
            uid: self.uid.unwrap_or_else(generate_uid),
            mobile_number: self.mobile_number.filter(|n| !n.is_empty()),
        }
    }
}

/// Fields to change on the signed-in user's profile. `None` leaves a
/// field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_settings: Option<Value>,

    /// Anything else the profile endpoint accepts.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_mobile_number(mut self, number: impl Into<String>) -> Self {
        self.mobile_number = Some(number.into());
        self
    }

    #[must_use]
    pub fn with_privacy_settings(mut self, settings: Value) -> Self {
        self.privacy_settings = Some(settings);
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// An already-picked image to upload alongside a registration or profile
/// update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileImage {
    pub file_name: String,
    /// MIME type, e.g. `image/jpeg`.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ProfileImage {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn into_part(self, field: &str) -> FilePart {
        FilePart {
            field: field.to_string(),
            file_name: self.file_name,
            content_type: self.content_type,
            bytes: self.bytes,
        }
    }
}

/// Flattens a JSON object into multipart text fields.
///
/// Strings are sent as-is, `null`s are dropped, and anything else
/// (numbers, booleans, nested objects) is sent as its JSON text.
pub(crate) fn form_fields(body: &Value) -> Vec<(String, String)> {
    let Some(object) = body.as_object() else {
        return Vec::new();
    };
    object
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), text))
        })
        .collect()
}

/// A random 32-character hex id (128 bits).
fn generate_uid() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
