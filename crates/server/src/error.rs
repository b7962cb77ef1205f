//! The coded error rendered to HTTP responses.

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use porter_provider::ProviderError;

/// An error with a fixed HTTP translation.
///
/// Bodies are a single plain-text line terminated by a newline, with
/// `X-Content-Type-Options: nosniff` so proxies never re-interpret
/// them. `NotModified` is the one bodyless sentinel.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    Internal(String),

    /// 304 sentinel; carries no body.
    #[error("resource not modified")]
    NotModified,
}

impl ApiError {
    /// The HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotModified => StatusCode::NOT_MODIFIED,
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound => Self::NotFound(err.to_string()),
            ProviderError::Denied => Self::Forbidden(err.to_string()),
            ProviderError::NotModified => Self::NotModified,
            ProviderError::NoPresign => Self::NotFound(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, Self::NotModified) {
            return StatusCode::NOT_MODIFIED.into_response();
        }

        let mut response = Response::new(Body::from(format!("{self}\n")));
        *response.status_mut() = self.status_code();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.headers_mut().insert(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        );
        response
    }
}

/// Result type for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
