//! Defines the endpoint for updating an existing transaction.

use axum::{
    Json,
    extract::{
        OriginalUri, Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use time::OffsetDateTime;

use crate::{
    ApiError, Error,
    database_id::TransactionId,
    transaction::{
        Transaction, TransactionRequest, TransactionState,
        core::{get_transaction, update_transaction},
    },
};

/// A route handler for replacing the fields of a transaction, responds with
/// the updated transaction.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    OriginalUri(uri): OriginalUri,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Json<Transaction>, ApiError> {
    update(&state, transaction_id, body)
        .map(Json)
        .map_err(|error| {
            error
                .into_internal("An error occurred while updating the transaction")
                .at(uri.path())
        })
}

fn update(
    state: &TransactionState,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Transaction, Error> {
    let Path(transaction_id) = transaction_id?;
    let Json(request) = body?;
    tracing::info!("Updating transaction with ID {transaction_id}");

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    // A missing transaction is reported before any problems with the request body.
    get_transaction(transaction_id, &connection)?;
    let transaction = request.validate(OffsetDateTime::now_utc())?;

    update_transaction(
        transaction_id,
        &transaction,
        state.max_transactions_per_customer,
        &connection,
    )
}
