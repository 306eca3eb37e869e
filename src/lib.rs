//! Ledger is a small REST service for recording financial transactions.
//!
//! Every transaction belongs to a customer and records how much was spent at
//! which merchant and when. Requests under `/api` pass through a per-client,
//! per-route fixed-window rate limiter before they reach the handlers.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::http::StatusCode;
use axum_server::Handle;
use tokio::signal;

mod app_state;
mod database_id;
mod db;
mod endpoints;
mod error_response;
mod logging;
mod rate_limit;
mod routing;
mod transaction;

pub use app_state::{AppState, DEFAULT_MAX_TRANSACTIONS_PER_CUSTOMER};
pub use database_id::TransactionId;
pub use db::initialize as initialize_db;
pub use error_response::{ApiError, ErrorResponse};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use rate_limit::{
    RateLimitConfig, RateLimitDecision, RateLimitKey, RateLimiter, spawn_eviction_task,
};
pub use routing::build_router;
pub use transaction::{Transaction, TransactionRequest};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The message sent to clients when a request is rejected by the rate limiter.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Try again later.";

/// The message sent to clients in place of the details of an unexpected error.
const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request was malformed or broke a business rule, e.g. a
    /// non-positive amount or a date in the future.
    #[error("{0}")]
    InvalidArgument(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("{0}")]
    NotFound(String),

    /// The route exists but does not accept the request's HTTP method.
    #[error("{0}")]
    MethodNotAllowed(String),

    /// The client sent too many requests to the same route within one rate
    /// limit window.
    #[error("Rate limit exceeded. Try again later.")]
    RateLimitExceeded {
        /// How long until the client's current window ends.
        retry_after: Duration,
    },

    /// An infrastructure fault that has already been logged.
    ///
    /// The message is safe to show to the client.
    #[error("{0}")]
    InternalError(String),

    /// An unhandled/unexpected SQL error.
    ///
    /// The error should only be logged for debugging on the server.
    /// When communicating with the client this error is replaced with
    /// a general error message.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => {
                Error::NotFound("the requested resource could not be found".to_owned())
            }
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The HTTP status code that this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::InternalError(_) | Error::SqlError(_) | Error::DatabaseLockError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message that may be shown to the client.
    ///
    /// Storage errors are replaced with a generic message so that SQL and
    /// other internals never reach the client.
    pub fn client_message(&self) -> String {
        match self {
            Error::SqlError(_) | Error::DatabaseLockError => UNEXPECTED_ERROR_MESSAGE.to_owned(),
            error => error.to_string(),
        }
    }

    /// Replace a storage fault with an [Error::InternalError] carrying `message`.
    ///
    /// Expected outcomes such as [Error::NotFound] and
    /// [Error::InvalidArgument] pass through unchanged.
    pub(crate) fn into_internal(self, message: &str) -> Self {
        match self {
            Error::SqlError(error) => {
                tracing::error!("{message}: {error}");
                Error::InternalError(message.to_owned())
            }
            Error::DatabaseLockError => {
                tracing::error!("{message}: could not acquire the database lock");
                Error::InternalError(message.to_owned())
            }
            error => error,
        }
    }
}
