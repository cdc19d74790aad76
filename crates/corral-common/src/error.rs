//! Error types for control-plane operations
//!
//! The adapter surfaces a small set of distinguished kinds so that callers
//! can decide between 400/404/409/500 without inspecting message strings.
//! Kubernetes API failures are classified by their status code when they are
//! converted from `kube::Error`.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for control-plane operations
#[derive(Debug, Error)]
pub enum Error {
    /// The requested resource does not exist
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind (e.g., "Cluster", "ClusterTemplate")
        kind: String,
        /// Resource name
        name: String,
    },

    /// The control plane rejected the request as malformed
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A resource with the same name already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The write conflicted with a concurrent modification
    #[error("conflict: {0}")]
    Conflict(String),

    /// The control plane refused our credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No template in the project carries the default label
    #[error("default template not found")]
    DefaultTemplateNotFound,

    /// More than one template in the project carries the default label
    #[error("multiple default templates found ({0})")]
    MultipleDefaultTemplates(usize),

    /// Validation error for resource contents
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "metadata.labels")
        field: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "create_cluster")
        context: String,
    },
}

impl Error {
    /// Create a not-found error for a resource
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with a field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Returns true if this error means the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the control plane rejected the request contents
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_) | Self::Validation { .. })
    }

    /// Returns true for name collisions and concurrent-write conflicts
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists(_) | Self::Conflict(_))
    }

    /// Re-label a not-found error with the resource that was actually requested.
    ///
    /// kube reports 404s without the kind we asked for, so the adapter
    /// attaches it afterwards.
    pub fn for_resource(self, kind: &str, name: &str) -> Self {
        match self {
            Self::NotFound { .. } => Self::not_found(kind, name),
            other => other,
        }
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) => match resp.code {
                404 => Self::not_found(UNKNOWN_CONTEXT, resp.message),
                400 | 422 => Self::BadRequest(resp.message),
                409 if resp.reason == "AlreadyExists" => Self::AlreadyExists(resp.message),
                409 => Self::Conflict(resp.message),
                401 | 403 => Self::Unauthorized(resp.message),
                _ => Self::internal_with_context("kubernetes", resp.message),
            },
            other => Self::internal_with_context("kubernetes", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("code {}", code),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_kube_404_maps_to_not_found() {
        let err: Error = api_error(404, "NotFound").into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_kube_409_distinguishes_already_exists() {
        let exists: Error = api_error(409, "AlreadyExists").into();
        assert!(matches!(exists, Error::AlreadyExists(_)));

        let conflict: Error = api_error(409, "Conflict").into();
        assert!(matches!(conflict, Error::Conflict(_)));
        assert!(conflict.is_conflict());
    }

    #[test]
    fn test_kube_400_maps_to_bad_request() {
        let err: Error = api_error(400, "BadRequest").into();
        assert!(err.is_bad_request());
    }

    #[test]
    fn test_kube_403_maps_to_unauthorized() {
        let err: Error = api_error(403, "Forbidden").into();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_kube_500_maps_to_internal() {
        let err: Error = api_error(500, "InternalError").into();
        assert!(matches!(err, Error::Internal { .. }));
        assert!(err.to_string().contains("kubernetes"));
    }

    #[test]
    fn test_for_resource_relabels_not_found() {
        let err = Error::not_found(UNKNOWN_CONTEXT, "whatever").for_resource("Cluster", "c-1");
        assert_eq!(err.to_string(), "Cluster c-1 not found");
    }

    #[test]
    fn test_for_resource_keeps_other_errors() {
        let err = Error::internal("boom").for_resource("Cluster", "c-1");
        assert!(matches!(err, Error::Internal { .. }));
    }
}
