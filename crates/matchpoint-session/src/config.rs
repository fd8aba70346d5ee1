//! Session layer configuration.

use std::time::Duration;

/// Timeouts applied to the requests the session layer issues.
///
/// ```rust
/// use std::time::Duration;
/// use matchpoint_session::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_request_timeout(Some(Duration::from_secs(10)));
/// assert_eq!(config.otp_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Timeout for registration and OTP verification calls.
    /// Default: 30 seconds.
    pub otp_timeout: Duration,

    /// Timeout for every other request that doesn't set its own.
    /// Default: `None` (the HTTP client's own default).
    pub request_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            otp_timeout: Duration::from_secs(30),
            request_timeout: None,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_otp_timeout(mut self, timeout: Duration) -> Self {
        self.otp_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}
