//! Session state: the single record every screen reads.
//!
//! A "session" here is the client's view of who is signed in:
//! - WHICH tokens it holds (access + refresh)
//! - WHO the user is (last-known `UserRecord`)
//! - WHETHER the user chose guest mode instead of signing in
//! - WHAT went wrong last, and whether an auth operation is running

use matchpoint_protocol::UserRecord;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// AuthMode
// ---------------------------------------------------------------------------

/// Which of the three mutually exclusive modes the session is in.
///
/// ```text
///   Unauthenticated ──(login / OTP / auto-login)──→ Authenticated
///         │   ↑                                        │
///         │   └──────(logout / failed refresh)─────────┘
///         │
///         └──(continue as guest)──→ Guest ──(login)──→ Authenticated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// An access token is held.
    Authenticated,
    /// The user skipped login. No tokens are held.
    Guest,
    /// Neither.
    Unauthenticated,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Snapshot of the session.
///
/// Only `SessionManager` (and the authorized client it owns) ever writes
/// this. Readers get copies through `SessionManager::snapshot` or watch
/// changes through `SessionManager::subscribe`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Bearer token for authenticated requests; absent ⇒ not authenticated.
    pub access_token: Option<String>,

    /// Exchanged for a new access token when the current one is rejected.
    pub refresh_token: Option<String>,

    /// Last-known profile; may be stale relative to the server.
    pub current_user: Option<UserRecord>,

    /// The user explicitly skipped login.
    pub guest_mode: bool,

    /// Message of the last failed auth operation, for an error banner.
    pub last_error: Option<String>,

    /// An auth operation (restore, login, OTP verify, logout, ...) is running.
    pub is_loading: bool,
}

impl Session {
    /// The state at process start: empty, loading until restore finishes.
    pub fn initial() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    /// Which mode the session is in. A held token wins over `guest_mode`.
    pub fn mode(&self) -> AuthMode {
        if self.access_token.is_some() {
            AuthMode::Authenticated
        } else if self.guest_mode {
            AuthMode::Guest
        } else {
            AuthMode::Unauthenticated
        }
    }

    /// Token presence. Guests are NOT authenticated: gate writes on this.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Authenticated or guest: routing shows the main app for both.
    pub fn has_app_access(&self) -> bool {
        self.mode() != AuthMode::Unauthenticated
    }

    /// Name to greet the user with.
    pub fn display_name(&self) -> Option<&str> {
        self.current_user.as_ref().and_then(UserRecord::display_name)
    }

    /// Drops every credential and marker, keeping only `is_loading`.
    pub(crate) fn clear(&mut self) {
        *self = Self {
            is_loading: self.is_loading,
            ..Self::default()
        };
    }
}

// ---------------------------------------------------------------------------
// SessionCell
// ---------------------------------------------------------------------------

/// The one place session state lives.
///
/// A `watch` channel is a single-value slot with change notification:
/// writers replace (or modify) the value, readers always see the latest.
/// The sender stays inside this crate, so all mutation funnels through
/// the manager's operations.
#[derive(Debug)]
pub(crate) struct SessionCell {
    tx: watch::Sender<Session>,
}

impl SessionCell {
    pub(crate) fn new(initial: Session) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub(crate) fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.tx.borrow().access_token.clone()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut Session)) {
        self.tx.send_modify(f);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}
