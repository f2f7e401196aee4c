//! Error types for thumbla
//!
//! Defines the request-level error kinds using thiserror and maps each kind
//! to the HTTP status it surfaces as.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for thumbla
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed locator, unknown path or invalid pipeline parameters
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Fetch completed but produced no body
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected by the rate limiter
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Network, auth, upstream non-2xx, SSRF block or oversized source
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Unknown content type, corrupt bytes or dimension cap exceeded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Operator-raised failure (e.g. crop out of bounds)
    #[error("Manipulator error: {0}")]
    Manipulator(String),

    /// Unknown or unsupported output content type
    #[error("Encode error: {0}")]
    Encode(String),

    /// Face detector failure. Logged where it occurs, never surfaced to
    /// the client; the face pipeline continues with no faces.
    #[error("Detector error: {0}")]
    Detector(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the thumbla Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status this error surfaces as
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::Fetch(_)
            | Error::Decode(_)
            | Error::Manipulator(_)
            | Error::Encode(_)
            | Error::Detector(_)
            | Error::Config(_)
            | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("{}", self);
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            Error::Fetch("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Decode("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Encode("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
