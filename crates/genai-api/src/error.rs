//! Error types for the MCP gateway
//!
//! Every failure is converted into one of these variants where it is
//! detected; `IntoResponse` is the single place they become HTTP responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Methods the MCP route accepts, advertised on 405 responses
pub const ALLOWED_METHODS: &str = "GET, POST, PUT";

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed caller input
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid identity
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// Caller may not access the resource
    #[error("authorization failed: {0}")]
    Forbidden(String),

    /// Target service could not be found
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP method not supported on this route
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Forwarded request failed in transit
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error renders as
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        // K8s-style Status response
        let body = serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": self.to_string(),
            "code": status.as_u16()
        });

        let mut response = (status, axum::Json(body)).into_response();
        if matches!(self, Error::MethodNotAllowed(_)) {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        response
    }
}

impl From<genai_common::Error> for Error {
    fn from(e: genai_common::Error) -> Self {
        if e.is_not_found() {
            Error::NotFound(e.to_string())
        } else {
            Error::Internal(e.to_string())
        }
    }
}
