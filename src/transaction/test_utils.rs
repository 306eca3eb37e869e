use std::sync::{Arc, Mutex};

use axum::{Json, extract::rejection::JsonRejection};
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use crate::{
    db::initialize,
    transaction::{TransactionRequest, TransactionState},
};

pub(crate) fn must_create_test_connection() -> Connection {
    let connection =
        Connection::open_in_memory().expect("could not create in-memory SQLite database");
    initialize(&connection).expect("could not initialize test DB");

    connection
}

pub(crate) fn get_test_state(max_transactions_per_customer: u32) -> TransactionState {
    TransactionState {
        db_connection: Arc::new(Mutex::new(must_create_test_connection())),
        max_transactions_per_customer,
    }
}

/// A request that passes validation, dated one minute ago.
pub(crate) fn valid_request(customer: &str, amount: i64) -> TransactionRequest {
    TransactionRequest {
        customer: customer.to_owned(),
        amount,
        merchant: "StoreA".to_owned(),
        date: OffsetDateTime::now_utc() - Duration::minutes(1),
    }
}

pub(crate) fn json_body(
    request: TransactionRequest,
) -> Result<Json<TransactionRequest>, JsonRejection> {
    Ok(Json(request))
}
