//! Defines the endpoint for fetching a single transaction.

use axum::{
    Json,
    extract::{OriginalUri, Path, State, rejection::PathRejection},
};

use crate::{
    ApiError, Error,
    database_id::TransactionId,
    transaction::{Transaction, TransactionState, core::get_transaction},
};

/// A route handler that responds with the transaction `transaction_id`.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    OriginalUri(uri): OriginalUri,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
) -> Result<Json<Transaction>, ApiError> {
    let fetch = || -> Result<Transaction, Error> {
        let Path(transaction_id) = transaction_id?;
        tracing::info!("Fetching transaction with ID {transaction_id}");

        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        get_transaction(transaction_id, &connection)
    };

    fetch().map(Json).map_err(|error| {
        error
            .into_internal("An error occurred while fetching the transaction")
            .at(uri.path())
    })
}
