//! The user record the server produces and the client caches.
//!
//! The client treats this record as mostly opaque: it reads a handful of
//! fields (identity, display name, user type, organizer approval) and
//! carries everything else through untouched, so a record written to the
//! session store and read back is exactly what the server sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What kind of account a user has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserType {
    /// Registers teams and joins tournaments.
    Player,
    /// Creates and manages tournaments (once approved).
    Organizer,
}

impl UserType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "player" => Some(Self::Player),
            "organizer" => Some(Self::Organizer),
            _ => None,
        }
    }
}

/// A user's profile as last seen from the server.
///
/// May be stale relative to the server; call
/// `SessionManager::fetch_current_user` to refresh it.
///
/// Reading never fails on an oddly typed field: a known key whose value
/// has an unexpected type is left in `extra` untouched, and the typed
/// field stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Map<String, Value>")]
pub struct UserRecord {
    /// Server-assigned identity. Numbers on the wire are kept as strings.
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Raw `userType` string; see [`UserRecord::user_type`].
    #[serde(rename = "userType", skip_serializing_if = "Option::is_none")]
    pub user_type_raw: Option<String>,

    /// Organizer gate: organizers can't manage tournaments until approved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_approved: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_settings: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Set only on the locally fabricated guest record.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_guest: bool,

    /// Every field we don't read (or couldn't), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for UserRecord {
    fn from(mut fields: Map<String, Value>) -> Self {
        let id = match fields.get("id") {
            Some(Value::String(_)) => take_string(&mut fields, "id"),
            Some(Value::Number(n)) => {
                let id = n.to_string();
                fields.remove("id");
                Some(id)
            }
            Some(Value::Null) => {
                fields.remove("id");
                None
            }
            _ => None,
        };

        Self {
            id: id.unwrap_or_default(),
            name: take_string(&mut fields, "name"),
            display_name: take_string(&mut fields, "displayName"),
            full_name: take_string(&mut fields, "fullName"),
            username: take_string(&mut fields, "username"),
            email: take_string(&mut fields, "email"),
            user_type_raw: take_string(&mut fields, "userType"),
            is_approved: take_bool(&mut fields, "isApproved"),
            privacy_settings: match fields.remove("privacySettings") {
                None | Some(Value::Null) => None,
                Some(value) => Some(value),
            },
            role: take_string(&mut fields, "role"),
            is_guest: take_bool(&mut fields, "isGuest").unwrap_or(false),
            extra: fields,
        }
    }
}

/// Removes `key` if it holds a string; any other value stays in `fields`.
fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(_)) => match fields.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        Some(Value::Null) => {
            fields.remove(key);
            None
        }
        _ => None,
    }
}

fn take_bool(fields: &mut Map<String, Value>, key: &str) -> Option<bool> {
    match fields.get(key) {
        Some(Value::Bool(b)) => {
            let b = *b;
            fields.remove(key);
            Some(b)
        }
        Some(Value::Null) => {
            fields.remove(key);
            None
        }
        _ => None,
    }
}

impl UserRecord {
    /// The id used by the locally fabricated guest record.
    pub const GUEST_ID: &'static str = "guest";

    /// Fabricates the local record used in guest mode.
    ///
    /// Serializes as
    /// `{"id":"guest","name":"Guest User","email":"guest@example.com","role":"guest","isGuest":true}`.
    pub fn guest() -> Self {
        Self {
            id: Self::GUEST_ID.to_string(),
            name: Some("Guest User".to_string()),
            email: Some("guest@example.com".to_string()),
            role: Some("guest".to_string()),
            is_guest: true,
            ..Self::default()
        }
    }

    /// Extracts a user record from a response `data` payload.
    ///
    /// The server nests the record differently per endpoint: directly in
    /// `data`, under `data.user`, or under `data.player` (login). Returns
    /// `None` when no object with an identity can be found.
    pub fn from_payload(data: &Value) -> Option<Self> {
        let candidate = ["user", "player"]
            .iter()
            .find_map(|key| data.get(*key).filter(|v| v.is_object()))
            .unwrap_or(data);

        let mut record = Self::from(candidate.as_object()?.clone());
        for key in ["accessToken", "refreshToken", "tokens"] {
            record.extra.remove(key);
        }

        // Document stores hand out `_id`; keep it in `extra` but also
        // expose it as the identity.
        if record.id.is_empty() {
            record.id = match record.extra.get("_id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
        }

        (!record.id.is_empty()).then_some(record)
    }

    /// Display name fallback chain: `name` → `displayName` → `fullName`.
    pub fn display_name(&self) -> Option<&str> {
        [&self.name, &self.display_name, &self.full_name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|n| !n.trim().is_empty())
    }

    /// Parsed `userType`, `None` when absent or unrecognized.
    pub fn user_type(&self) -> Option<UserType> {
        self.user_type_raw.as_deref().and_then(UserType::parse)
    }

    /// `true` for organizers the platform has approved.
    pub fn is_approved_organizer(&self) -> bool {
        self.user_type() == Some(UserType::Organizer) && self.is_approved == Some(true)
    }
}
