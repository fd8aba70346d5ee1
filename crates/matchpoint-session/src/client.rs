//! The authorized HTTP client: bearer injection and refresh-on-401.
//!
//! Every request a screen or service makes goes through
//! [`AuthorizedClient::send`], which wraps the raw transport in two steps:
//!
//! ```text
//!   send(req)
//!     │
//!     ├─ request step:  attach "Bearer <access token>" from live state,
//!     │                 unless the route is public or a bearer is already set
//!     │
//!     ├─ transport.send
//!     │
//!     └─ response step: 401 on a protected, first-attempt request?
//!            ├─ refresh token held → refresh (single-flight) → re-send once
//!            └─ none held          → clear the session
//! ```
//!
//! Refreshes are serialized by a gate. A caller that had to wait on the
//! gate re-checks the live access token first: if someone else already
//! swapped it, the new token is reused and no second refresh is issued.

use matchpoint_protocol::{ApiEnvelope, RefreshRequest, TokenPair};
use matchpoint_transport::{ApiRequest, ApiResponse, HttpTransport, Route};
use tokio::sync::{Mutex, watch};

use crate::state::SessionCell;
use crate::{KeyValueStore, Session, SessionConfig, SessionError, TokenVault};

/// HTTP client bound to a session.
///
/// Owned by `SessionManager`, and shared (behind an `Arc`) with services
/// like the tournament client that need authenticated calls.
pub struct AuthorizedClient<T, P, S> {
    transport: T,
    vault: TokenVault<P, S>,
    state: SessionCell,
    refresh_gate: Mutex<()>,
    config: SessionConfig,
}

impl<T, P, S> AuthorizedClient<T, P, S>
where
    T: HttpTransport,
    P: KeyValueStore,
    S: KeyValueStore,
{
    pub(crate) fn new(transport: T, vault: TokenVault<P, S>, config: SessionConfig) -> Self {
        Self {
            transport,
            vault,
            state: SessionCell::new(Session::initial()),
            refresh_gate: Mutex::new(()),
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn vault(&self) -> &TokenVault<P, S> {
        &self.vault
    }

    pub(crate) fn state(&self) -> &SessionCell {
        &self.state
    }

    /// A copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.state.snapshot()
    }

    /// A receiver that observes every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Sends a request with bearer injection and refresh-on-401.
    ///
    /// A `401` is returned as a response, not an error: if the refresh
    /// fails, the caller gets the original `401` (and the session is gone).
    ///
    /// # Errors
    /// Returns [`SessionError::Network`] if the request (or its retry) got
    /// no response.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let public = request.is_public();
        if !public && request.bearer.is_none() {
            request.bearer = self.state.access_token();
        }

        let response = self.dispatch(&request).await?;
        if !response.is_unauthorized() || public || request.is_retry {
            return Ok(response);
        }
        // Nothing was presented, so nothing was rejected (guests land here).
        if request.bearer.is_none() {
            return Ok(response);
        }

        if self.state.snapshot().refresh_token.is_none() {
            tracing::info!(
                route = %request.route,
                "401 with no refresh token, clearing session"
            );
            self.clear_session().await;
            return Ok(response);
        }

        match self.refresh(request.bearer.as_deref()).await {
            Ok(token) => {
                request.bearer = Some(token);
                request.is_retry = true;
                tracing::debug!(route = %request.route, "retrying after refresh");
                self.dispatch(&request).await
            }
            Err(err) => {
                tracing::warn!(route = %request.route, error = %err, "refresh failed");
                Ok(response)
            }
        }
    }

    /// Sends a request exactly as given: no bearer injection, no refresh.
    ///
    /// # Errors
    /// Returns [`SessionError::Network`] if the request got no response.
    pub async fn send_direct(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        self.dispatch(&request).await
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// `rejected` is the access token the server just refused. If the live
    /// token differs, another caller has already refreshed and the live
    /// token is returned without contacting the server.
    ///
    /// Any failure clears the session, unless the session was replaced
    /// while the exchange was in flight: then the outcome is discarded and
    /// the live token (if any) is returned.
    ///
    /// # Errors
    /// Returns [`SessionError::RefreshFailed`] if there is nothing to
    /// refresh or the server refused.
    pub async fn refresh(&self, rejected: Option<&str>) -> Result<String, SessionError> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.state.snapshot();
        let Some(access_token) = current.access_token else {
            return Err(SessionError::RefreshFailed("session was cleared".into()));
        };
        if rejected != Some(access_token.as_str()) {
            tracing::debug!("access token already refreshed, reusing it");
            return Ok(access_token);
        }
        let Some(refresh_token) = current.refresh_token else {
            self.clear_session().await;
            return Err(SessionError::RefreshFailed("no refresh token".into()));
        };

        let exchanged = self.exchange(refresh_token).await;

        // A login, logout or guest switch may have landed during the
        // exchange; the result belongs to a session that no longer exists.
        let live = self.state.access_token();
        if live.as_deref() != Some(access_token.as_str()) {
            tracing::debug!("session changed during refresh, discarding result");
            return live.ok_or_else(|| SessionError::RefreshFailed("session was cleared".into()));
        }

        match exchanged {
            Ok(tokens) => {
                let access_token = tokens.access_token.clone();
                self.state.update(|s| {
                    s.access_token = Some(tokens.access_token.clone());
                    s.refresh_token = tokens.refresh_token.clone();
                });
                if let Err(err) = self.vault.replace_tokens(&tokens).await {
                    tracing::warn!(error = %err, "refreshed tokens were not persisted");
                }
                tracing::info!("access token refreshed");
                Ok(access_token)
            }
            Err(reason) => {
                self.clear_session().await;
                Err(SessionError::RefreshFailed(reason))
            }
        }
    }

    /// POSTs the refresh token. A response without a new refresh token
    /// keeps the old one.
    async fn exchange(&self, refresh_token: String) -> Result<TokenPair, String> {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: refresh_token.clone(),
        })
        .map_err(|e| e.to_string())?;
        let request = ApiRequest::post(Route::RefreshToken).json(body);

        let response = self.dispatch(&request).await.map_err(|e| e.to_string())?;
        let envelope = ApiEnvelope::from_value(&response.body);
        if !response.is_success() || !envelope.success {
            return Err(envelope.message_or(&format!("status {}", response.status)));
        }

        let mut tokens = TokenPair::from_payload(envelope.data_or_null())
            .ok_or_else(|| "refresh response carried no access token".to_string())?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token);
        }
        Ok(tokens)
    }

    /// Drops every credential from memory and from both stores, and
    /// leaves guest mode.
    ///
    /// Storage failures are logged and otherwise ignored: the in-memory
    /// session is cleared regardless.
    pub async fn clear_session(&self) {
        self.state.update(Session::clear);
        if let Err(err) = self.vault.clear().await {
            tracing::warn!(error = %err, "failed to clear persisted session");
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, SessionError> {
        let response = if request.timeout.is_none() && self.config.request_timeout.is_some() {
            let request = request.clone().timeout(self.config.request_timeout);
            self.transport.send(&request).await
        } else {
            self.transport.send(request).await
        };

        match response {
            Ok(response) => {
                tracing::debug!(
                    method = %request.method,
                    route = %request.route,
                    status = response.status,
                    "response"
                );
                Ok(response)
            }
            Err(err) => {
                tracing::warn!(
                    method = %request.method,
                    route = %request.route,
                    error = %err,
                    "no response"
                );
                Err(err.into())
            }
        }
    }
}

impl<T, P, S> std::fmt::Debug for AuthorizedClient<T, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
