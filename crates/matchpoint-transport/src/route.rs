//! Route identifiers and the table that maps them to paths.
//!
//! Every request names the route it targets. Whether a request is
//! "public" (never carries a bearer token, never triggers a token refresh)
//! is a property of the route, decided here, instead of being guessed from
//! the URL string.

use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP methods the Matchpoint API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// A server route, identified by what it does rather than by its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// Registration, first submission.
    Register,
    Login,
    /// OTP confirmation of an email address.
    VerifyEmail,
    ResendOtp,
    ForgotPassword,
    ResetPassword,
    RefreshToken,
    Logout,
    /// "Who am I" for the bearer of the token.
    CurrentUser,
    UpdateProfile,
    ChangePassword,
    /// The tournament collection (list on GET, create on POST).
    Tournaments,
    /// A single tournament by id.
    Tournament(String),
    /// Any other path, always treated as protected.
    Custom(String),
}

impl Route {
    /// `true` if requests to this route must never carry a bearer token
    /// and a `401` from it must never trigger a refresh.
    ///
    /// The tournament listing is public only for `GET`; creating a
    /// tournament on the same path is protected.
    pub fn is_public(&self, method: Method) -> bool {
        match self {
            Self::Register
            | Self::Login
            | Self::VerifyEmail
            | Self::ResendOtp
            | Self::ForgotPassword
            | Self::ResetPassword
            | Self::RefreshToken => true,
            Self::Tournaments => method == Method::Get,
            Self::Logout
            | Self::CurrentUser
            | Self::UpdateProfile
            | Self::ChangePassword
            | Self::Tournament(_)
            | Self::Custom(_) => false,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register => f.write_str("register"),
            Self::Login => f.write_str("login"),
            Self::VerifyEmail => f.write_str("verify-email"),
            Self::ResendOtp => f.write_str("resend-otp"),
            Self::ForgotPassword => f.write_str("forgot-password"),
            Self::ResetPassword => f.write_str("reset-password"),
            Self::RefreshToken => f.write_str("refresh-token"),
            Self::Logout => f.write_str("logout"),
            Self::CurrentUser => f.write_str("current-user"),
            Self::UpdateProfile => f.write_str("update-profile"),
            Self::ChangePassword => f.write_str("change-password"),
            Self::Tournaments => f.write_str("tournaments"),
            Self::Tournament(id) => write!(f, "tournament/{id}"),
            Self::Custom(path) => write!(f, "custom:{path}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Path table: which server path each [`Route`] lives at.
///
/// Paths are deployment configuration. The defaults match the current
/// backend; override individual paths with the `with_*` methods or by
/// deserializing a partial table (missing entries keep their defaults).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub register: String,
    /// OTP confirmation shares the registration path by default.
    pub verify_email: String,
    pub resend_otp: String,
    pub login: String,
    pub logout: String,
    pub refresh_token: String,
    pub current_user: String,
    pub update_profile: String,
    pub forgot_password: String,
    pub reset_password: String,
    pub change_password: String,
    pub tournaments: String,
    /// Template with an `{id}` placeholder.
    pub tournament: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            register: "/player-auth/register".into(),
            verify_email: "/player-auth/register".into(),
            resend_otp: "/player-auth/resend-otp".into(),
            login: "/player-auth/login".into(),
            logout: "/player-auth/logout".into(),
            refresh_token: "/player-auth/refresh-token".into(),
            current_user: "/player-auth/me".into(),
            update_profile: "/player-auth/profile".into(),
            forgot_password: "/player-auth/forgot-password".into(),
            reset_password: "/player-auth/reset-password".into(),
            change_password: "/player-auth/change-password".into(),
            tournaments: "/tournaments".into(),
            tournament: "/tournaments/{id}".into(),
        }
    }
}

impl Endpoints {
    /// Resolves the path for a route.
    pub fn path_for(&self, route: &Route) -> String {
        match route {
            Route::Register => self.register.clone(),
            Route::Login => self.login.clone(),
            Route::VerifyEmail => self.verify_email.clone(),
            Route::ResendOtp => self.resend_otp.clone(),
            Route::ForgotPassword => self.forgot_password.clone(),
            Route::ResetPassword => self.reset_password.clone(),
            Route::RefreshToken => self.refresh_token.clone(),
            Route::Logout => self.logout.clone(),
            Route::CurrentUser => self.current_user.clone(),
            Route::UpdateProfile => self.update_profile.clone(),
            Route::ChangePassword => self.change_password.clone(),
            Route::Tournaments => self.tournaments.clone(),
            Route::Tournament(id) => self.tournament.replace("{id}", id),
            Route::Custom(path) => path.clone(),
        }
    }

    #[must_use]
    pub fn with_register(mut self, path: impl Into<String>) -> Self {
        self.register = path.into();
        self
    }

    #[must_use]
    pub fn with_verify_email(mut self, path: impl Into<String>) -> Self {
        self.verify_email = path.into();
        self
    }

    #[must_use]
    pub fn with_resend_otp(mut self, path: impl Into<String>) -> Self {
        self.resend_otp = path.into();
        self
    }

    #[must_use]
    pub fn with_login(mut self, path: impl Into<String>) -> Self {
        self.login = path.into();
        self
    }

    #[must_use]
    pub fn with_logout(mut self, path: impl Into<String>) -> Self {
        self.logout = path.into();
        self
    }

    #[must_use]
    pub fn with_refresh_token(mut self, path: impl Into<String>) -> Self {
        self.refresh_token = path.into();
        self
    }

    #[must_use]
    pub fn with_current_user(mut self, path: impl Into<String>) -> Self {
        self.current_user = path.into();
        self
    }

    #[must_use]
    pub fn with_update_profile(mut self, path: impl Into<String>) -> Self {
        self.update_profile = path.into();
        self
    }

    #[must_use]
    pub fn with_forgot_password(mut self, path: impl Into<String>) -> Self {
        self.forgot_password = path.into();
        self
    }

    #[must_use]
    pub fn with_reset_password(mut self, path: impl Into<String>) -> Self {
        self.reset_password = path.into();
        self
    }

    #[must_use]
    pub fn with_change_password(mut self, path: impl Into<String>) -> Self {
        self.change_password = path.into();
        self
    }

    #[must_use]
    pub fn with_tournaments(mut self, path: impl Into<String>) -> Self {
        self.tournaments = path.into();
        self
    }

    #[must_use]
    pub fn with_tournament(mut self, template: impl Into<String>) -> Self {
        self.tournament = template.into();
        self
    }
}
