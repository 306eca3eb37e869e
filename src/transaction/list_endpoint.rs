//! Defines the endpoint for listing every transaction.

use axum::{
    Json,
    extract::{OriginalUri, State},
};

use crate::{
    ApiError, Error,
    transaction::{Transaction, TransactionState, core::list_transactions},
};

/// A route handler that responds with every stored transaction, oldest first.
pub async fn get_all_transactions_endpoint(
    State(state): State<TransactionState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    tracing::info!("Listing all transactions");

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError.at(uri.path()))?;

    let transactions = list_transactions(&connection).map_err(|error| {
        error
            .into_internal("An error occurred while listing the transactions")
            .at(uri.path())
    })?;

    if transactions.is_empty() {
        tracing::warn!("No transactions found");
    }

    Ok(Json(transactions))
}
