//! Defines the endpoint for creating a new transaction.

use axum::{
    Json,
    extract::{OriginalUri, State, rejection::JsonRejection},
    http::StatusCode,
};
use time::OffsetDateTime;

use crate::{
    ApiError, Error,
    transaction::{Transaction, TransactionRequest, TransactionState, core::create_transaction},
};

/// A route handler for creating a new transaction, responds with the stored
/// transaction and its new ID.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    OriginalUri(uri): OriginalUri,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let created = create(&state, body).map_err(|error| {
        error
            .into_internal("An error occurred while saving the transaction")
            .at(uri.path())
    })?;

    Ok((StatusCode::CREATED, Json(created)))
}

fn create(
    state: &TransactionState,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Transaction, Error> {
    let Json(request) = body?;
    tracing::info!("Creating a transaction for customer {}", request.customer);

    let transaction = request.validate(OffsetDateTime::now_utc())?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let created = create_transaction(
        &transaction,
        state.max_transactions_per_customer,
        &connection,
    )?;
    tracing::info!("Created transaction {}", created.id);

    Ok(created)
}
