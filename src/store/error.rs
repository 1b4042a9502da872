//! Error types for the configuration store.

use super::validation::ValidationError;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the service and every backend.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Key, value, or option structure was rejected before touching storage.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The underlying storage operation failed (I/O, constraint, transaction abort).
    #[error("persistence error: {0:#}")]
    Persistence(#[from] anyhow::Error),

    /// The remote peer answered with something other than the expected shape.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl StoreError {
    /// Field-level issues, if this is a validation failure.
    #[must_use]
    pub fn validation_issues(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Failures talking to a remote peer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Non-success status; carries the status code and response body text.
    #[error("remote request failed ({status}): {body}")]
    Status { status: u16, body: String },

    /// Response body did not validate into the expected shape.
    #[error("invalid remote payload: {0}")]
    InvalidPayload(String),

    /// The request never produced a response (connect, timeout, decode).
    #[error("remote transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProtocolError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }

    /// Remote status code, when the peer answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
