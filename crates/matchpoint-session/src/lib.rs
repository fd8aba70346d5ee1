//! Session management for the Matchpoint client.
//!
//! This crate owns everything about who is signed in:
//!
//! 1. **State**: the single [`Session`] record screens read, and its
//!    [`AuthMode`] (authenticated / guest / unauthenticated)
//! 2. **Persistence**: tokens and the user record in a secure store or a
//!    session-only store ([`KeyValueStore`], [`TokenVault`])
//! 3. **Authorized requests**: bearer injection and single-flight
//!    refresh-on-401 ([`AuthorizedClient`])
//! 4. **Auth flows**: restore, login, registration with OTP, guest mode,
//!    logout, profile updates ([`SessionManager`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Screens / services (above)  ← call SessionManager, read Session snapshots
//!     ↕
//! Session Layer (this crate)  ← owns tokens, user record, refresh
//!     ↕
//! Transport Layer (below)     ← sends ApiRequests, returns ApiResponses
//! ```

#![allow(async_fn_in_trait)]

mod client;
mod config;
mod error;
mod manager;
mod outcome;
mod profile;
mod state;
mod store;
mod vault;

pub use client::AuthorizedClient;
pub use config::SessionConfig;
pub use error::{SessionError, StoreError, accept_envelope};
pub use manager::SessionManager;
pub use outcome::{LoginOutcome, RegistrationOutcome, VerifyOutcome};
pub use profile::{PROFILE_IMAGE_FIELD, ProfileImage, ProfileUpdate, RegistrationProfile};
pub use state::{AuthMode, Session};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use vault::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenVault, USER_KEY};
