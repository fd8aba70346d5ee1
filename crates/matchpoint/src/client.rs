//! `MatchpointClientBuilder`: wires transport, stores, and session together.

use std::path::PathBuf;

use matchpoint_session::{FileStore, MemoryStore, SessionConfig, SessionManager};
use matchpoint_transport::{Endpoints, ReqwestTransport};
use url::Url;

use crate::{ClientConfig, MatchpointError, TournamentClient};

/// The production session: reqwest over HTTP, a file-backed secure store,
/// and an in-memory session store.
pub type MatchpointSession = SessionManager<ReqwestTransport, FileStore, MemoryStore>;

/// Tournament client bound to a [`MatchpointSession`].
pub type MatchpointTournaments = TournamentClient<ReqwestTransport, FileStore, MemoryStore>;

/// Builder for a [`MatchpointSession`].
///
/// # Example
///
/// ```rust,no_run
/// use matchpoint::prelude::*;
///
/// # async fn run() -> Result<(), MatchpointError> {
/// let session = MatchpointClientBuilder::from_env()?.build();
/// session.restore_session().await?;
///
/// let tournaments = TournamentClient::new(session.client());
/// let open = tournaments.list().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MatchpointClientBuilder {
    config: ClientConfig,
}

impl MatchpointClientBuilder {
    /// Creates a builder for the API at `api_url` with default settings.
    pub fn new(api_url: Url) -> Self {
        Self::from_config(ClientConfig::new(api_url))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Creates a builder from `MATCHPOINT_*` environment variables.
    ///
    /// # Errors
    /// See [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self, MatchpointError> {
        ClientConfig::from_env().map(Self::from_config)
    }

    /// Sets the file backing the secure store.
    pub fn secure_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.secure_store_path = path.into();
        self
    }

    /// Sets the endpoint path table.
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    /// Sets the session configuration (timeouts).
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Builds the session. Nothing is read from disk until
    /// `restore_session` is called.
    pub fn build(self) -> MatchpointSession {
        let ClientConfig {
            api_url,
            secure_store_path,
            endpoints,
            session,
        } = self.config;

        tracing::info!(
            api_url = %api_url,
            secure_store = %secure_store_path.display(),
            "building matchpoint session"
        );

        let transport = ReqwestTransport::new(api_url).with_endpoints(endpoints);
        SessionManager::new(
            transport,
            FileStore::new(secure_store_path),
            MemoryStore::new(),
            session,
        )
    }
}
