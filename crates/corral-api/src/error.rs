//! Translation of service errors into HTTP responses

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use corral_core::ServiceError;

/// Error type for request handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Error returned by the service layer
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Missing, malformed or nil project id header
    #[error("no active project id provided")]
    MissingProject,

    /// Query string or body that could not be decoded
    #[error("{0}")]
    InvalidRequest(String),

    /// The request outlived its deadline
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(e) => match e {
                ServiceError::BadInput(_) => StatusCode::BAD_REQUEST,
                ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::MissingProject | ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::DeadlineExceeded => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "request failed");
        }
        let body = serde_json::json!({ "message": message });
        (status, Json(body)).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::InvalidRequest(e.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::InvalidRequest(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_service_errors_map_to_status() {
        let cases = [
            (ServiceError::bad_input("bad"), StatusCode::BAD_REQUEST),
            (
                ServiceError::Unauthorized("no token".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (ServiceError::not_found("gone"), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("in use".into()), StatusCode::CONFLICT),
            (
                ServiceError::internal("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let message = err.message().to_string();
            let (status, body) = body_json(ApiError::from(err)).await;
            assert_eq!(status, expected);
            assert_eq!(body["message"], message);
        }
    }

    #[tokio::test]
    async fn test_missing_project_body() {
        let (status, body) = body_json(ApiError::MissingProject).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "no active project id provided");
    }

    #[tokio::test]
    async fn test_deadline_is_internal() {
        let (status, body) = body_json(ApiError::DeadlineExceeded).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "request deadline exceeded");
    }
}
