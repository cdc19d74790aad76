//! Project id extraction
//!
//! The project id arrives as a UUID in the `Activeprojectid` header and is
//! used as the namespace of every control-plane call.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the caller's active project
pub const PROJECT_HEADER: &str = "Activeprojectid";

/// The active project of a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectId(String);

impl ProjectId {
    /// Project id as a namespace name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Read the project id from request headers
///
/// A missing header, a value that is not a UUID and the nil UUID are all
/// rejected.
pub fn project_from_headers(headers: &HeaderMap) -> Result<ProjectId, ApiError> {
    let value = headers
        .get(PROJECT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingProject)?;
    let id = Uuid::parse_str(value.trim()).map_err(|_| ApiError::MissingProject)?;
    if id.is_nil() {
        return Err(ApiError::MissingProject);
    }
    Ok(ProjectId(id.to_string()))
}

impl<S: Send + Sync> FromRequestParts<S> for ProjectId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        project_from_headers(&parts.headers)
    }
}
