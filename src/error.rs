//! Error types for ETag lookups.

use http::StatusCode;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by lookup policies and cache backends.
///
/// Only [`Error::MissingAttribute`] and [`Error::PreconditionFailed`] come out
/// of the policy itself. The remaining variants belong to backends and
/// configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// The domain object does not expose the configured attribute.
    ///
    /// This is a programming error: every versioned type must define it.
    #[error("'{type_name}' has no attribute '{attribute}'")]
    MissingAttribute {
        type_name: &'static str,
        attribute: String,
    },

    /// The client's token does not match the current version.
    #[error("precondition failed: expected {expected:?}, got {presented:?}")]
    PreconditionFailed {
        expected: String,
        presented: Option<String>,
    },

    /// Reading an attribute required serializing the object, which failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The cache store is unavailable or returned an error.
    #[error("backend error: {0}")]
    BackendError(String),

    /// Invalid lookup or backend configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// HTTP status a boundary layer should render for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this is the 412 signal rather than a fault.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Error::PreconditionFailed { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}
