//! Tournament endpoints, called through the session's authorized client.
//!
//! Listing is public; everything else carries the bearer token the
//! session holds, and gets the session's refresh-on-401 for free.

use std::sync::Arc;

use matchpoint_protocol::{ApiEnvelope, ProtocolError};
use matchpoint_session::{AuthorizedClient, KeyValueStore, SessionError, accept_envelope};
use matchpoint_transport::{ApiRequest, HttpTransport, Route};
use serde::Serialize;
use serde_json::Value;

use crate::MatchpointError;

/// CRUD over `/tournaments`.
pub struct TournamentClient<T, P, S> {
    client: Arc<AuthorizedClient<T, P, S>>,
}

impl<T, P, S> Clone for TournamentClient<T, P, S> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<T, P, S> TournamentClient<T, P, S>
where
    T: HttpTransport,
    P: KeyValueStore,
    S: KeyValueStore,
{
    pub fn new(client: Arc<AuthorizedClient<T, P, S>>) -> Self {
        Self { client }
    }

    /// `GET /tournaments`. Works for guests.
    ///
    /// # Errors
    /// [`MatchpointError::Session`] on rejection or no response.
    pub async fn list(&self) -> Result<Value, MatchpointError> {
        self.call(ApiRequest::get(Route::Tournaments), "Failed to load tournaments")
            .await
    }

    /// `GET /tournaments/{id}`.
    ///
    /// # Errors
    /// [`MatchpointError::Session`] on rejection or no response.
    pub async fn get(&self, id: &str) -> Result<Value, MatchpointError> {
        self.call(
            ApiRequest::get(Route::Tournament(id.to_string())),
            "Failed to load tournament",
        )
        .await
    }

    /// `POST /tournaments`. Needs a signed-in (approved organizer) user.
    ///
    /// # Errors
    /// [`MatchpointError::Session`] with `Unauthenticated` when no token is
    /// held; otherwise on rejection or no response.
    pub async fn create(&self, tournament: &impl Serialize) -> Result<Value, MatchpointError> {
        self.require_token()?;
        let request = ApiRequest::post(Route::Tournaments).json(to_json(tournament)?);
        self.call(request, "Failed to create tournament").await
    }

    /// `PUT /tournaments/{id}`.
    ///
    /// # Errors
    /// Same as [`create`](Self::create).
    pub async fn update(
        &self,
        id: &str,
        changes: &impl Serialize,
    ) -> Result<Value, MatchpointError> {
        self.require_token()?;
        let request = ApiRequest::put(Route::Tournament(id.to_string())).json(to_json(changes)?);
        self.call(request, "Failed to update tournament").await
    }

    /// `DELETE /tournaments/{id}`. Returns the server's envelope.
    ///
    /// # Errors
    /// Same as [`create`](Self::create).
    pub async fn delete(&self, id: &str) -> Result<ApiEnvelope, MatchpointError> {
        self.require_token()?;
        let response = self
            .client
            .send(ApiRequest::delete(Route::Tournament(id.to_string())))
            .await?;
        Ok(accept_envelope(&response, "Failed to delete tournament")?)
    }

    fn require_token(&self) -> Result<(), SessionError> {
        if self.client.snapshot().is_authenticated() {
            Ok(())
        } else {
            Err(SessionError::Unauthenticated)
        }
    }

    async fn call(&self, request: ApiRequest, fallback: &str) -> Result<Value, MatchpointError> {
        let route = request.route.clone();
        let response = self.client.send(request).await?;
        let envelope = accept_envelope(&response, fallback)?;
        tracing::debug!(%route, status = response.status, "tournament call");
        Ok(envelope.data.unwrap_or(Value::Null))
    }
}

fn to_json(body: &impl Serialize) -> Result<Value, ProtocolError> {
    serde_json::to_value(body).map_err(ProtocolError::Encode)
}
