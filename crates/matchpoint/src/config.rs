//! Client configuration, from code or from the environment.

use std::path::PathBuf;
use std::time::Duration;

use matchpoint_session::SessionConfig;
use matchpoint_transport::Endpoints;
use url::Url;

use crate::MatchpointError;

/// Where the secure store lives unless configured otherwise.
pub const DEFAULT_SECURE_STORE: &str = ".matchpoint/credentials.json";

type EndpointSetter = fn(Endpoints, String) -> Endpoints;

/// One override variable per endpoint path.
const ENDPOINT_VARS: &[(&str, EndpointSetter)] = &[
    ("MATCHPOINT_REGISTER_PATH", |e, p| e.with_register(p)),
    ("MATCHPOINT_VERIFY_EMAIL_PATH", |e, p| e.with_verify_email(p)),
    ("MATCHPOINT_RESEND_OTP_PATH", |e, p| e.with_resend_otp(p)),
    ("MATCHPOINT_LOGIN_PATH", |e, p| e.with_login(p)),
    ("MATCHPOINT_LOGOUT_PATH", |e, p| e.with_logout(p)),
    ("MATCHPOINT_REFRESH_TOKEN_PATH", |e, p| e.with_refresh_token(p)),
    ("MATCHPOINT_CURRENT_USER_PATH", |e, p| e.with_current_user(p)),
    ("MATCHPOINT_UPDATE_PROFILE_PATH", |e, p| e.with_update_profile(p)),
    ("MATCHPOINT_FORGOT_PASSWORD_PATH", |e, p| e.with_forgot_password(p)),
    ("MATCHPOINT_RESET_PASSWORD_PATH", |e, p| e.with_reset_password(p)),
    ("MATCHPOINT_CHANGE_PASSWORD_PATH", |e, p| e.with_change_password(p)),
    ("MATCHPOINT_TOURNAMENTS_PATH", |e, p| e.with_tournaments(p)),
    ("MATCHPOINT_TOURNAMENT_PATH", |e, p| e.with_tournament(p)),
];

/// Everything needed to build a [`MatchpointSession`](crate::MatchpointSession).
///
/// The API base URL is a constructor parameter; everything else has a
/// default and a `with_*` override.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: Url,
    /// File backing the secure store ("remember me" tokens).
    pub secure_store_path: PathBuf,
    pub endpoints: Endpoints,
    pub session: SessionConfig,
}

impl ClientConfig {
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            secure_store_path: PathBuf::from(DEFAULT_SECURE_STORE),
            endpoints: Endpoints::default(),
            session: SessionConfig::default(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `MATCHPOINT_API_URL`: API base URL, e.g. `https://api.example.com/api`
    ///
    /// # Optional env vars
    /// - `MATCHPOINT_SECURE_STORE`: secure store file
    ///   (default `.matchpoint/credentials.json`)
    /// - `MATCHPOINT_OTP_TIMEOUT_SECS`: registration / OTP timeout (default 30)
    /// - `MATCHPOINT_REQUEST_TIMEOUT_SECS`: default timeout for other
    ///   requests; `0` or unset means none
    /// - `MATCHPOINT_<ENDPOINT>_PATH`: override one endpoint path, e.g.
    ///   `MATCHPOINT_LOGIN_PATH=/v2/auth/login`
    ///
    /// # Errors
    ///
    /// Returns [`MatchpointError::Config`] if the URL is missing or invalid,
    /// or a timeout isn't a whole number of seconds.
    pub fn from_env() -> Result<Self, MatchpointError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MatchpointError> {
        let api_url_str = lookup("MATCHPOINT_API_URL")
            .ok_or_else(|| MatchpointError::Config("MATCHPOINT_API_URL is required".into()))?;
        let api_url: Url = api_url_str
            .parse()
            .map_err(|e| MatchpointError::Config(format!("MATCHPOINT_API_URL: {e}")))?;

        let mut config = Self::new(api_url);

        if let Some(path) = lookup("MATCHPOINT_SECURE_STORE") {
            config = config.with_secure_store_path(path);
        }
        if let Some(secs) = parse_secs(&lookup, "MATCHPOINT_OTP_TIMEOUT_SECS")? {
            config.session = config.session.with_otp_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_secs(&lookup, "MATCHPOINT_REQUEST_TIMEOUT_SECS")? {
            let timeout = (secs > 0).then(|| Duration::from_secs(secs));
            config.session = config.session.with_request_timeout(timeout);
        }

        for (var, set) in ENDPOINT_VARS {
            if let Some(path) = lookup(var) {
                config.endpoints = set(config.endpoints, path);
            }
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_secure_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.secure_store_path = path.into();
        self
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    #[must_use]
    pub fn with_session_config(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<u64>, MatchpointError> {
    lookup(var)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| MatchpointError::Config(format!("{var}: {e}")))
        })
        .transpose()
}
