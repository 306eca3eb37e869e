//! The JSON body sent to clients when a request fails.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Error;

/// The body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// The numeric HTTP status code.
    pub status_code: u16,
    /// The reason phrase for the status code, e.g. "Not Found".
    pub error: String,
    /// A description of what went wrong that is safe to show to the client.
    pub message: String,
    /// The path of the request that failed.
    pub path: String,
    /// When the error occurred, in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ErrorResponse {
    /// Create an error body for `status` timestamped with the current time.
    pub fn new(status: StatusCode, message: &str, path: &str) -> Self {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;

        Self {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or_default().to_owned(),
            message: message.to_owned(),
            path: path.to_owned(),
            timestamp: timestamp as i64,
        }
    }
}

/// An [Error] paired with the path of the request that caused it.
///
/// Route handlers return this so that the error body can report the path.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    path: String,
}

impl ApiError {
    /// Create an error for the request to `path`.
    pub fn new(error: Error, path: &str) -> Self {
        Self {
            error,
            path: path.to_owned(),
        }
    }

    /// The underlying error.
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Take the underlying error, discarding the path.
    pub fn into_error(self) -> Error {
        self.error
    }
}

impl Error {
    /// Attach the request path to this error so it can be sent as a response.
    pub fn at(self, path: &str) -> ApiError {
        ApiError::new(self, path)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        if status.is_server_error() {
            tracing::error!("Request to {} failed: {}", self.path, self.error);
        }

        let body = ErrorResponse::new(status, &self.error.client_message(), &self.path);
        let mut response = (status, Json(body)).into_response();

        if let Error::RateLimitExceeded { retry_after } = self.error {
            // Round up so that a client waiting this long is admitted.
            let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds.max(1)));
        }

        response
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidArgument(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::InvalidArgument(rejection.body_text())
    }
}
