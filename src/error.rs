//! Errors raised inside the control loops.

use thiserror::Error;

use crate::venue::Venue;

/// Failure that ends a controller run (or rejects a `start`).
#[derive(Debug, Error)]
pub enum ControlError {
    /// No open session for a venue the controller needs.
    #[error("{0} session not found")]
    SessionNotFound(Venue),

    /// A venue adapter call was rejected.
    #[error("{venue} {action} failed: {source:#}")]
    AdapterCall {
        venue: Venue,
        action: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Start parameters out of range; no run was created.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

impl ControlError {
    pub(crate) fn adapter(venue: Venue, action: &'static str, source: anyhow::Error) -> Self {
        ControlError::AdapterCall {
            venue,
            action,
            source,
        }
    }
}
