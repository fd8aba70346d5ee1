//! The session manager: sole owner of who is signed in.
//!
//! Every screen talks to the session through this type. It is the only
//! writer of session state and, through its [`TokenVault`], the only
//! writer of the persisted `accessToken` / `refreshToken` / `user` keys.
//!
//! # Concurrency
//!
//! Auth operations (restore, login, registration, OTP verification,
//! guest entry) hold an operation gate for their whole duration. A second
//! operation started while one is in flight fails fast with
//! [`SessionError::OperationInProgress`] instead of racing it for the final
//! state write. `logout` and `restore_session` wait for the gate rather
//! than failing: a logout always completes, and a repeated restore is a
//! no-op that reports the restored mode.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use matchpoint_protocol::{
    ApiEnvelope, AuthPayload, ConflictKind, Credentials, EmailRequest, OtpConfirmation,
    PasswordChange, PasswordReset, ProtocolError, TokenPair, UserRecord,
};
use matchpoint_transport::{ApiRequest, ApiResponse, HttpTransport, Route};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard, watch};

use crate::error::accept_envelope;
use crate::profile::{PROFILE_IMAGE_FIELD, form_fields};
use crate::state::SessionCell;
use crate::{
    AuthMode, AuthorizedClient, KeyValueStore, LoginOutcome, ProfileImage, ProfileUpdate,
    RegistrationOutcome, RegistrationProfile, Session, SessionConfig, SessionError, TokenVault,
    VerifyOutcome,
};

/// Owns the session and exposes every auth operation.
///
/// ## Lifecycle
///
/// ```text
/// restore_session() ──→ [Authenticated] ←── login / verify_otp / 201 registration
///        │                   │     ↑
///        │          logout / │     │ refresh (transparent)
///        │    failed refresh │     │
///        ▼                   ▼     │
/// [Unauthenticated] ←──────────────┘
///        │
///        └── continue_as_guest() ──→ [Guest] ──(login)──→ [Authenticated]
/// ```
///
/// `T` is the HTTP transport, `P` the secure persistent store, `S` the
/// session-only store.
pub struct SessionManager<T, P, S> {
    client: Arc<AuthorizedClient<T, P, S>>,

    /// Set by the first `restore_session` call.
    restored: AtomicBool,

    /// Held for the duration of an auth operation.
    op_gate: Mutex<()>,

    config: SessionConfig,
}

impl<T, P, S> SessionManager<T, P, S>
where
    T: HttpTransport,
    P: KeyValueStore,
    S: KeyValueStore,
{
    /// Creates a manager with an empty, loading session. Call
    /// [`restore_session`](Self::restore_session) next.
    pub fn new(transport: T, secure_store: P, session_store: S, config: SessionConfig) -> Self {
        let vault = TokenVault::new(secure_store, session_store);
        Self {
            client: Arc::new(AuthorizedClient::new(transport, vault, config.clone())),
            restored: AtomicBool::new(false),
            op_gate: Mutex::new(()),
            config,
        }
    }

    // -- Accessors ---------------------------------------------------------

    /// A copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.client.snapshot()
    }

    /// A receiver that observes every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.client.subscribe()
    }

    /// The authorized client, for services that make authenticated calls.
    pub fn client(&self) -> Arc<AuthorizedClient<T, P, S>> {
        Arc::clone(&self.client)
    }

    /// Token presence. Guests are not authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // -- Startup -----------------------------------------------------------

    /// Restores a persisted session at startup.
    ///
    /// Reads tokens (secure store first, then the session store) and the
    /// cached user; fetches the user from the server if none is cached.
    /// Only the first call does anything; later calls (including ones made
    /// while the first is still running, which wait for it) return the
    /// current mode.
    ///
    /// Fails closed: if anything goes wrong, the session and both stores
    /// are cleared and `Unauthenticated` is returned.
    ///
    /// # Errors
    /// None at present; every failure is reported as `Unauthenticated`.
    pub async fn restore_session(&self) -> Result<AuthMode, SessionError> {
        if self.restored.load(Ordering::Acquire) {
            return Ok(self.snapshot().mode());
        }
        let permit = self.op_gate.lock().await;
        if self.restored.load(Ordering::Acquire) {
            return Ok(self.snapshot().mode());
        }
        let _op = self.enter(permit);

        let mode = match self.restore_inner().await {
            Ok(mode) => {
                tracing::info!(?mode, "session restored");
                mode
            }
            Err(err) => {
                tracing::warn!(error = %err, "session restore failed, clearing");
                self.client.clear_session().await;
                AuthMode::Unauthenticated
            }
        };
        self.restored.store(true, Ordering::Release);
        Ok(mode)
    }

    async fn restore_inner(&self) -> Result<AuthMode, SessionError> {
        let vault = self.client.vault();
        let Some(tokens) = vault.load_tokens().await? else {
            return Ok(AuthMode::Unauthenticated);
        };

        self.state().update(|s| {
            s.access_token = Some(tokens.access_token);
            s.refresh_token = tokens.refresh_token;
            s.guest_mode = false;
        });

        let cached = vault.load_user().await?.filter(|u| !u.is_guest);
        let user = match cached {
            Some(user) => Some(user),
            None => {
                let fetched = self.fetch_user().await?;
                if let Some(user) = &fetched {
                    self.adopt_user(user).await;
                }
                fetched
            }
        };

        match user {
            Some(user) => {
                self.state().update(|s| s.current_user = Some(user));
                Ok(AuthMode::Authenticated)
            }
            None => {
                self.client.clear_session().await;
                Ok(AuthMode::Unauthenticated)
            }
        }
    }

    // -- Login -------------------------------------------------------------

    /// Signs in with email and password.
    ///
    /// On success the session is updated before this returns, and tokens
    /// are persisted to the secure store (`remember_me`) or the session
    /// store (otherwise).
    ///
    /// # Errors
    /// - [`SessionError::Rejected`]: wrong credentials etc.; tokens untouched
    /// - [`SessionError::Network`]: no response
    /// - [`SessionError::OperationInProgress`]: another auth operation runs
    pub async fn login_with_credentials(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<LoginOutcome, SessionError> {
        let _op = self.begin("login")?;
        let result = self.login_inner(email, password, remember_me).await;
        self.settle("login", result)
    }

    async fn login_inner(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<LoginOutcome, SessionError> {
        let body = to_body(&Credentials {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response = self
            .client
            .send(ApiRequest::post(Route::Login).json(body))
            .await?;
        let envelope = accept_envelope(&response, "Login failed")?;

        let (tokens, user) = AuthPayload::session_from_data(envelope.data_or_null())?;
        self.establish_session(tokens, user, remember_me).await
    }

    /// The shared login-success path: state first, then persistence, then a
    /// user backfill if the server left the user out.
    async fn establish_session(
        &self,
        tokens: TokenPair,
        user: Option<UserRecord>,
        remember_me: bool,
    ) -> Result<LoginOutcome, SessionError> {
        self.state().update(|s| {
            s.access_token = Some(tokens.access_token.clone());
            s.refresh_token = tokens.refresh_token.clone();
            s.current_user = user.clone();
            s.guest_mode = false;
            s.last_error = None;
        });

        let vault = self.client.vault();
        let mut persisted = true;
        if let Err(err) = vault.save_tokens(&tokens, remember_me).await {
            tracing::warn!(error = %err, "tokens were not persisted");
            persisted = false;
        }

        let user = match user {
            Some(user) => {
                if let Err(err) = vault.save_user(&user).await {
                    tracing::warn!(error = %err, "user record was not persisted");
                    persisted = false;
                }
                Some(user)
            }
            None => match self.fetch_user().await {
                Ok(Some(user)) => {
                    persisted &= self.adopt_user(&user).await;
                    Some(user)
                }
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(error = %err, "could not fetch user after sign-in");
                    None
                }
            },
        };

        // The backfill can clear the session if the new token is refused.
        if !self.is_authenticated() {
            return Err(SessionError::Unauthenticated);
        }

        tracing::info!(
            user_id = user.as_ref().map_or("", |u| u.id.as_str()),
            remember_me,
            persisted,
            "signed in"
        );
        Ok(LoginOutcome { user, persisted })
    }

    // -- Registration ------------------------------------------------------

    /// Submits a registration, optionally with a profile picture
    /// (sent as multipart).
    ///
    /// | status | outcome |
    /// |--------|---------|
    /// | `202`  | `VerificationRequired`: OTP sent |
    /// | `201`  | `AutoLogin`: tokens issued, session established |
    /// | `409`  | unverified account: `VerificationRequired`; verified: `Err(AlreadyRegistered)` |
    /// | other 2xx | `AutoLogin` if tokens are present, else `VerificationRequired` |
    ///
    /// An auto-login keeps its tokens in the session store only.
    ///
    /// # Errors
    /// [`SessionError::AlreadyRegistered`], [`SessionError::Rejected`],
    /// [`SessionError::Network`], [`SessionError::OperationInProgress`].
    pub async fn register_with_otp(
        &self,
        profile: RegistrationProfile,
        image: Option<ProfileImage>,
    ) -> Result<RegistrationOutcome, SessionError> {
        let _op = self.begin("registration")?;
        let result = self.register_inner(profile, image).await;
        self.settle("registration", result)
    }

    async fn register_inner(
        &self,
        profile: RegistrationProfile,
        image: Option<ProfileImage>,
    ) -> Result<RegistrationOutcome, SessionError> {
        let request = profile.into_request();
        let email = request.email.clone();
        let body = to_body(&request)?;

        let api_request = match image {
            Some(image) => ApiRequest::post(Route::Register)
                .multipart(form_fields(&body), Some(image.into_part(PROFILE_IMAGE_FIELD))),
            None => ApiRequest::post(Route::Register).json(body),
        }
        .timeout(Some(self.config.otp_timeout));

        let response = self.client.send(api_request).await?;
        tracing::info!(status = response.status, "registration submitted");

        match response.status {
            202 => Ok(RegistrationOutcome::VerificationRequired { email }),
            201 => self.auto_login(&response).await,
            409 => match ConflictKind::from_body(&response.body) {
                ConflictKind::ResumeVerification => {
                    tracing::info!("account exists unverified, resuming verification");
                    Ok(RegistrationOutcome::VerificationRequired { email })
                }
                ConflictKind::AlreadyVerified => Err(SessionError::AlreadyRegistered),
            },
            _ if response.is_success() => {
                if TokenPair::from_payload(payload_of(&response)).is_some() {
                    self.auto_login(&response).await
                } else {
                    Ok(RegistrationOutcome::VerificationRequired { email })
                }
            }
            _ => Err(SessionError::rejected(&response, "Registration failed")),
        }
    }

    async fn auto_login(&self, response: &ApiResponse) -> Result<RegistrationOutcome, SessionError> {
        let (tokens, user) = AuthPayload::session_from_data(payload_of(response))?;
        let outcome = self.establish_session(tokens, user, false).await?;
        Ok(RegistrationOutcome::AutoLogin(outcome))
    }

    /// Confirms the OTP sent during registration.
    ///
    /// # Errors
    /// - [`SessionError::RegistrationExpired`]: the server returned `404`
    /// - [`SessionError::Rejected`]: wrong code etc.
    /// - [`SessionError::Network`], [`SessionError::OperationInProgress`]
    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        remember_me: bool,
    ) -> Result<VerifyOutcome, SessionError> {
        let _op = self.begin("verification")?;
        let result = self.verify_inner(email, code, remember_me).await;
        self.settle("verification", result)
    }

    async fn verify_inner(
        &self,
        email: &str,
        code: &str,
        remember_me: bool,
    ) -> Result<VerifyOutcome, SessionError> {
        let body = to_body(&OtpConfirmation {
            email: email.to_string(),
            otp: code.to_string(),
        })?;
        let request = ApiRequest::post(Route::VerifyEmail)
            .json(body)
            .timeout(Some(self.config.otp_timeout));

        let response = self.client.send(request).await?;
        if response.status == 404 {
            return Err(SessionError::RegistrationExpired);
        }
        let envelope = accept_envelope(&response, "Verification failed")?;

        let payload = match envelope.data.as_ref() {
            Some(data) if !data.is_null() => AuthPayload::from_data(data)?,
            _ => AuthPayload::Verified { user: None },
        };
        match payload {
            AuthPayload::Session { tokens, user } => Ok(VerifyOutcome::LoggedIn(
                self.establish_session(tokens, user, remember_me).await?,
            )),
            AuthPayload::Verified { user } => {
                tracing::info!("email verified, no session issued");
                Ok(VerifyOutcome::Verified { user })
            }
        }
    }

    /// Asks the server to send a new OTP. Returns the server's envelope.
    ///
    /// # Errors
    /// [`SessionError::Rejected`] or [`SessionError::Network`].
    pub async fn resend_otp(&self, email: &str) -> Result<ApiEnvelope, SessionError> {
        let body = EmailRequest { email: email.to_string() };
        let result = self
            .post_public(Route::ResendOtp, &body, "Failed to resend OTP")
            .await;
        self.settle("resend otp", result)
    }

    // -- Logout / guest ----------------------------------------------------

    /// Signs out. Tells the server (best effort) and always clears the
    /// session and both stores, whatever the server says.
    pub async fn logout(&self) {
        let permit = self.op_gate.lock().await;
        let _op = self.enter(permit);

        if let Some(token) = self.state().access_token() {
            let request = ApiRequest::post(Route::Logout).bearer(token);
            match self.client.send_direct(request).await {
                Ok(response) if response.is_success() => {}
                Ok(response) => {
                    tracing::debug!(status = response.status, "server refused logout");
                }
                Err(err) => tracing::debug!(error = %err, "logout call failed"),
            }
        }

        self.client.clear_session().await;
        tracing::info!("logged out");
    }

    /// Enters guest mode: drops any persisted tokens (without calling the
    /// server) and stores a local guest user.
    ///
    /// # Errors
    /// [`SessionError::Storage`] if the old tokens couldn't be removed;
    /// [`SessionError::OperationInProgress`].
    pub async fn continue_as_guest(&self) -> Result<UserRecord, SessionError> {
        let _op = self.begin("guest entry")?;
        let result = self.guest_inner().await;
        self.settle("guest entry", result)
    }

    async fn guest_inner(&self) -> Result<UserRecord, SessionError> {
        let vault = self.client.vault();
        vault.clear_tokens().await?;

        let guest = UserRecord::guest();
        self.state().update(|s| {
            s.access_token = None;
            s.refresh_token = None;
            s.current_user = Some(guest.clone());
            s.guest_mode = true;
            s.last_error = None;
        });
        if let Err(err) = vault.save_user(&guest).await {
            tracing::warn!(error = %err, "guest user was not persisted");
        }

        tracing::info!("continuing as guest");
        Ok(guest)
    }

    // -- Profile -----------------------------------------------------------

    /// Fetches the signed-in user from the server and caches it.
    ///
    /// Returns `Ok(None)` without a request if no token is held, and
    /// `Ok(None)` after clearing the session if the server answers `401`.
    ///
    /// # Errors
    /// [`SessionError::Rejected`] or [`SessionError::Network`].
    pub async fn fetch_current_user(&self) -> Result<Option<UserRecord>, SessionError> {
        let result = match self.fetch_user().await {
            Ok(Some(user)) => {
                self.adopt_user(&user).await;
                Ok(Some(user))
            }
            other => other,
        };
        self.settle("fetch current user", result)
    }

    /// GETs the current user with an explicit bearer, bypassing the
    /// refresh path. Doesn't touch `current_user`.
    async fn fetch_user(&self) -> Result<Option<UserRecord>, SessionError> {
        let Some(token) = self.state().access_token() else {
            return Ok(None);
        };

        let response = self
            .client
            .send_direct(ApiRequest::get(Route::CurrentUser).bearer(token))
            .await?;
        if response.is_unauthorized() {
            tracing::info!("current user request refused, clearing session");
            self.client.clear_session().await;
            return Ok(None);
        }
        let envelope = accept_envelope(&response, "Failed to load profile")?;
        Ok(UserRecord::from_payload(envelope.data_or_null()))
    }

    /// Updates the signed-in user's profile, optionally with a new picture
    /// (sent as multipart).
    ///
    /// # Errors
    /// - [`SessionError::Unauthenticated`]: no token held (guests included)
    /// - [`SessionError::Rejected`], [`SessionError::Network`]
    /// - [`SessionError::UnexpectedResponse`]: no user in the response
    pub async fn update_profile(
        &self,
        update: ProfileUpdate,
        image: Option<ProfileImage>,
    ) -> Result<UserRecord, SessionError> {
        let result = self.update_profile_inner(update, image).await;
        self.settle("profile update", result)
    }

    async fn update_profile_inner(
        &self,
        update: ProfileUpdate,
        image: Option<ProfileImage>,
    ) -> Result<UserRecord, SessionError> {
        let token = self
            .state()
            .access_token()
            .ok_or(SessionError::Unauthenticated)?;
        let body = to_body(&update)?;

        let request = match image {
            Some(image) => ApiRequest::put(Route::UpdateProfile)
                .multipart(form_fields(&body), Some(image.into_part(PROFILE_IMAGE_FIELD))),
            None => ApiRequest::put(Route::UpdateProfile).json(body),
        }
        .bearer(token);

        let response = self.client.send(request).await?;
        let envelope = accept_envelope(&response, "Profile update failed")?;
        let user = UserRecord::from_payload(envelope.data_or_null()).ok_or_else(|| {
            ProtocolError::UnexpectedShape("profile response carries no user".into())
        })?;

        self.adopt_user(&user).await;
        tracing::info!(user_id = %user.id, "profile updated");
        Ok(user)
    }

    // -- Passwords ---------------------------------------------------------

    /// Starts a password reset; the server emails an OTP.
    ///
    /// # Errors
    /// [`SessionError::Rejected`] or [`SessionError::Network`].
    pub async fn forgot_password(&self, email: &str) -> Result<ApiEnvelope, SessionError> {
        let body = EmailRequest { email: email.to_string() };
        let result = self
            .post_public(Route::ForgotPassword, &body, "Failed to send reset code")
            .await;
        self.settle("forgot password", result)
    }

    /// Completes a password reset with the emailed OTP.
    ///
    /// # Errors
    /// [`SessionError::Rejected`] or [`SessionError::Network`].
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<ApiEnvelope, SessionError> {
        let body = PasswordReset {
            email: email.to_string(),
            otp: otp.to_string(),
            new_password: new_password.to_string(),
        };
        let result = self
            .post_public(Route::ResetPassword, &body, "Failed to reset password")
            .await;
        self.settle("reset password", result)
    }

    /// Changes the signed-in user's password.
    ///
    /// # Errors
    /// [`SessionError::Unauthenticated`], [`SessionError::Rejected`] or
    /// [`SessionError::Network`].
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<ApiEnvelope, SessionError> {
        let result = async {
            if !self.is_authenticated() {
                return Err(SessionError::Unauthenticated);
            }
            let body = to_body(&PasswordChange {
                current_password: current_password.to_string(),
                new_password: new_password.to_string(),
            })?;
            let response = self
                .client
                .send(ApiRequest::put(Route::ChangePassword).json(body))
                .await?;
            accept_envelope(&response, "Failed to change password")
        }
        .await;
        self.settle("change password", result)
    }

    // -- Helpers -----------------------------------------------------------

    fn state(&self) -> &SessionCell {
        self.client.state()
    }

    async fn post_public<B: Serialize>(
        &self,
        route: Route,
        body: &B,
        fallback: &str,
    ) -> Result<ApiEnvelope, SessionError> {
        let response = self
            .client
            .send(ApiRequest::post(route).json(to_body(body)?))
            .await?;
        accept_envelope(&response, fallback)
    }

    /// Sets `current_user` and caches it. Returns whether caching worked.
    async fn adopt_user(&self, user: &UserRecord) -> bool {
        self.state().update(|s| s.current_user = Some(user.clone()));
        match self.client.vault().save_user(user).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "user record was not persisted");
                false
            }
        }
    }

    /// Takes the operation gate or fails fast.
    fn begin(&self, op: &'static str) -> Result<OperationGuard<'_>, SessionError> {
        let permit = self.op_gate.try_lock().map_err(|_| {
            tracing::debug!(op, "rejected, another auth operation is running");
            SessionError::OperationInProgress(op)
        })?;
        Ok(self.enter(permit))
    }

    fn enter<'a>(&'a self, permit: MutexGuard<'a, ()>) -> OperationGuard<'a> {
        self.state().update(|s| {
            s.is_loading = true;
            s.last_error = None;
        });
        OperationGuard {
            state: self.state(),
            _permit: permit,
        }
    }

    /// Mirrors the outcome into `last_error`: the failure message, or
    /// nothing once an operation succeeds.
    fn settle<R>(&self, op: &str, result: Result<R, SessionError>) -> Result<R, SessionError> {
        let message = match &result {
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(op, error = %err, "auth operation failed");
                Some(err.to_string())
            }
        };
        self.state().update(|s| s.last_error = message);
        result
    }
}

impl<T, P, S> std::fmt::Debug for SessionManager<T, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("restored", &self.restored.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Keeps `is_loading` set while an auth operation runs.
///
/// Clears the flag on drop, then releases the operation gate, so an early
/// return or `?` can't leave the session stuck in loading.
struct OperationGuard<'a> {
    state: &'a SessionCell,
    _permit: MutexGuard<'a, ()>,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.state.update(|s| s.is_loading = false);
    }
}

fn to_body<B: Serialize>(body: &B) -> Result<Value, SessionError> {
    serde_json::to_value(body).map_err(|e| ProtocolError::Encode(e).into())
}

/// Where an auth payload lives: `data` if present, else the whole body.
fn payload_of(response: &ApiResponse) -> &Value {
    match response.body.get("data") {
        Some(data) if data.is_object() => data,
        _ => &response.body,
    }
}
