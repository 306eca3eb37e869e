use axum::{
    extract::{OriginalUri, Path, State, rejection::PathRejection},
    http::StatusCode,
};

use crate::{
    ApiError, Error,
    database_id::TransactionId,
    transaction::{TransactionState, core::delete_transaction},
};

/// A route handler for deleting a transaction, responds with 204 No Content.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    OriginalUri(uri): OriginalUri,
    transaction_id: Result<Path<TransactionId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let delete = || -> Result<TransactionId, Error> {
        let Path(transaction_id) = transaction_id?;
        tracing::info!("Deleting transaction with ID {transaction_id}");

        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        delete_transaction(transaction_id, &connection)?;

        Ok(transaction_id)
    };

    match delete() {
        Ok(transaction_id) => {
            tracing::info!("Deleted transaction {transaction_id}");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(error) => Err(error
            .into_internal("An error occurred while deleting the transaction")
            .at(uri.path())),
    }
}
