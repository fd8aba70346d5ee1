//! Logging setup for binaries and examples built on this crate.

use tracing_subscriber::{EnvFilter, fmt};

use crate::MatchpointError;

/// Initialize tracing with `RUST_LOG` support (default `info`).
///
/// Library code only emits events; call this once at startup to see them.
///
/// # Errors
///
/// Returns [`MatchpointError::Config`] if a global subscriber is already set.
pub fn init_tracing() -> Result<(), MatchpointError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| MatchpointError::Config(format!("tracing already initialized: {err}")))
}
