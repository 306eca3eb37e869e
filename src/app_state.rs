//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::http::HeaderValue;
use rusqlite::Connection;

use crate::{
    Error,
    db::initialize,
    rate_limit::{RateLimitConfig, RateLimiter},
};

/// The default number of transactions a single customer may have stored.
pub const DEFAULT_MAX_TRANSACTIONS_PER_CUSTOMER: u32 = 100;

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// The rate limiter shared by every request to the API.
    pub rate_limiter: Arc<RateLimiter>,

    /// The number of transactions a single customer may have stored.
    pub max_transactions_per_customer: u32,

    /// The only origin allowed to make cross-origin requests, e.g. "http://localhost:3000".
    pub allowed_origin: HeaderValue,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        rate_limit_config: RateLimitConfig,
        max_transactions_per_customer: u32,
        allowed_origin: HeaderValue,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            rate_limiter: Arc::new(RateLimiter::new(rate_limit_config)),
            max_transactions_per_customer,
            allowed_origin,
        })
    }
}
