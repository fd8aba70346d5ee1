//! What the auth operations hand back on success.

use matchpoint_protocol::UserRecord;

/// A successful sign-in (login, auto-login after registration, or OTP
/// verification that issued tokens).
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    /// The signed-in user. `None` only if the server omitted it and the
    /// follow-up fetch failed too.
    pub user: Option<UserRecord>,

    /// `false` if the session is live in memory but couldn't be written
    /// to storage, so it won't survive a restart.
    pub persisted: bool,
}

/// Result of submitting a registration.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    /// An OTP was sent to `email`; call `verify_otp` next. Also returned
    /// when the account already exists but was never verified.
    VerificationRequired { email: String },

    /// The server created the account and signed the user in.
    AutoLogin(LoginOutcome),
}

impl RegistrationOutcome {
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::VerificationRequired { .. })
    }
}

/// Result of confirming an OTP.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// The server issued tokens; the session is now authenticated.
    LoggedIn(LoginOutcome),

    /// The email is verified but no session was issued; the user logs in
    /// next. Session state is untouched.
    Verified { user: Option<UserRecord> },
}
