//! # Matchpoint
//!
//! Session-aware client for the Matchpoint tournament platform API.
//!
//! Matchpoint owns the signed-in session of a player or organizer:
//! token storage ("remember me" in a secure store, otherwise in memory),
//! login / registration with OTP / guest mode, and an authorized HTTP
//! client that attaches bearer tokens and transparently refreshes them
//! on `401`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use matchpoint::prelude::*;
//!
//! # async fn run() -> Result<(), MatchpointError> {
//! init_tracing()?;
//! let session = MatchpointClientBuilder::from_env()?.build();
//!
//! if session.restore_session().await? == AuthMode::Unauthenticated {
//!     session
//!         .login_with_credentials("ada@example.com", "secret", true)
//!         .await?;
//! }
//!
//! let tournaments = TournamentClient::new(session.client());
//! let listing = tournaments.list().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
pub mod telemetry;
mod tournaments;

pub use client::{MatchpointClientBuilder, MatchpointSession, MatchpointTournaments};
pub use config::{ClientConfig, DEFAULT_SECURE_STORE};
pub use error::MatchpointError;
pub use telemetry::init_tracing;
pub use tournaments::TournamentClient;

pub use matchpoint_protocol as protocol;
pub use matchpoint_session as session;
pub use matchpoint_transport as transport;

/// Everything most applications need, in one import.
pub mod prelude {
    pub use crate::{
        ClientConfig, MatchpointClientBuilder, MatchpointError, MatchpointSession,
        MatchpointTournaments, TournamentClient, init_tracing,
    };
    pub use matchpoint_protocol::{ApiEnvelope, UserRecord, UserType};
    pub use matchpoint_session::{
        AuthMode, LoginOutcome, ProfileImage, ProfileUpdate, RegistrationOutcome,
        RegistrationProfile, Session, SessionConfig, SessionError, SessionManager,
        VerifyOutcome,
    };
    pub use matchpoint_transport::{Endpoints, Route};
}
