//! Service-level error kinds
//!
//! Each variant corresponds to one HTTP status class; the API layer maps
//! them 1:1 and uses the carried message as the response body.

use corral_common::Error as ControlPlaneError;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Error type for service operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or invalid request (400)
    #[error("{0}")]
    BadInput(String),

    /// Missing or invalid credentials (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Requested resource does not exist (404)
    #[error("{0}")]
    NotFound(String),

    /// Name collision or resource in use (409)
    #[error("{0}")]
    Conflict(String),

    /// Control-plane failure or broken invariant (500)
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Create a bad-input error
    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Internal error with the upstream cause appended
    pub fn internal_from(msg: &str, cause: impl std::fmt::Display) -> Self {
        Self::Internal(format!("{}: {}", msg, cause))
    }

    /// The message carried by any variant
    pub fn message(&self) -> &str {
        match self {
            Self::BadInput(m)
            | Self::Unauthorized(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Internal(m) => m,
        }
    }
}

/// Default translation: NotFound stays NotFound, anything else is internal
impl From<ControlPlaneError> for ServiceError {
    fn from(e: ControlPlaneError) -> Self {
        match e {
            ControlPlaneError::NotFound { .. } => Self::NotFound(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}
