//! Defines the core data models and database queries for transactions.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::{Connection, Row, Transaction as SqlTransaction, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{AppState, Error, database_id::TransactionId, transaction::validation::check_volume_cap};

// ============================================================================
// MODELS
// ============================================================================

/// A purchase made by a customer at a merchant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Identifies the customer who made the transaction.
    pub customer: String,
    /// The amount in the smallest unit of the currency, e.g. cents.
    pub amount: i64,
    /// The name or identifier of the merchant.
    pub merchant: String,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// The body of a request to create or update a transaction.
///
/// Nothing has been checked yet, see [TransactionRequest::validate].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Identifies the customer who made the transaction.
    pub customer: String,
    /// The amount in the smallest unit of the currency, e.g. cents.
    pub amount: i64,
    /// The name or identifier of the merchant.
    pub merchant: String,
    /// When the transaction happened, e.g. "2025-01-13T12:00:00Z".
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// The fields of a transaction that are ready to be written to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// Identifies the customer who made the transaction.
    pub customer: String,
    /// The amount in the smallest unit of the currency.
    pub amount: i64,
    /// The name or identifier of the merchant.
    pub merchant: String,
    /// When the transaction happened.
    pub date: OffsetDateTime,
}

/// The state needed by the transaction route handlers.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The number of transactions a single customer may have stored.
    pub max_transactions_per_customer: u32,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            max_transactions_per_customer: state.max_transactions_per_customer,
        }
    }
}

pub(crate) fn not_found(id: TransactionId) -> Error {
    Error::NotFound(format!("Transaction not found with ID: {id}"))
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new transaction in the database.
///
/// The customer's existing transactions are counted in the same database
/// transaction as the insert, so concurrent requests cannot push a customer
/// past `max_per_customer`.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidArgument] if the customer already has `max_per_customer` transactions,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    transaction: &NewTransaction,
    max_per_customer: u32,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let count = count_transactions_by_customer(&transaction.customer, &sql_transaction)?;
    check_volume_cap(count, max_per_customer)?;

    let created = sql_transaction
        .prepare(
            "INSERT INTO \"transaction\" (customer, amount, merchant, date)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, customer, amount, merchant, date",
        )?
        .query_row(
            params![
                transaction.customer,
                transaction.amount,
                transaction.merchant,
                transaction.date,
            ],
            map_transaction_row,
        )?;

    sql_transaction.commit()?;

    Ok(created)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT id, customer, amount, merchant, date FROM \"transaction\" WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => not_found(id),
            error => error.into(),
        })
}

/// Retrieve every transaction ordered by ID.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn list_transactions(connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare("SELECT id, customer, amount, merchant, date FROM \"transaction\" ORDER BY id")?
        .query_map([], map_transaction_row)?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Replace every field except the ID of the transaction `id`.
///
/// The volume cap is checked against every transaction stored for the
/// customer in the update, the same way as for a new transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - [Error::InvalidArgument] if the customer already has `max_per_customer` transactions,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    transaction: &NewTransaction,
    max_per_customer: u32,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let count = count_transactions_by_customer(&transaction.customer, &sql_transaction)?;
    check_volume_cap(count, max_per_customer)?;

    let updated = sql_transaction
        .prepare(
            "UPDATE \"transaction\"
            SET \
                customer = ?1, \
                amount = ?2, \
                merchant = ?3, \
                date = ?4 \
            WHERE id = ?5
            RETURNING id, customer, amount, merchant, date",
        )?
        .query_row(
            params![
                transaction.customer,
                transaction.amount,
                transaction.merchant,
                transaction.date,
                id,
            ],
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => not_found(id),
            error => error.into(),
        })?;

    sql_transaction.commit()?;

    Ok(updated)
}

/// Delete the transaction `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = :id",
        &[(":id", &id)],
    )?;

    match rows_affected {
        0 => Err(not_found(id)),
        _ => Ok(()),
    }
}

/// Get the number of transactions stored for `customer`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions_by_customer(
    customer: &str,
    connection: &Connection,
) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE customer = ?1",
            [customer],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                customer TEXT NOT NULL CHECK (customer <> ''),
                amount INTEGER NOT NULL CHECK (amount > 0),
                merchant TEXT NOT NULL CHECK (merchant <> ''),
                date TEXT NOT NULL
                )",
        (),
    )?;

    // Backs the per-customer count used by the volume cap.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_customer ON \"transaction\"(customer);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let customer = row.get(1)?;
    let amount = row.get(2)?;
    let merchant = row.get(3)?;
    let date = row.get(4)?;

    Ok(Transaction {
        id,
        customer,
        amount,
        merchant,
        date,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        Error,
        db::initialize,
        transaction::NewTransaction,
    };

    use super::{
        count_transactions_by_customer, create_transaction, delete_transaction, get_transaction,
        list_transactions, update_transaction,
    };

    const LIMIT: u32 = 100;

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn new_transaction(customer: &str, amount: i64) -> NewTransaction {
        NewTransaction {
            customer: customer.to_owned(),
            amount,
            merchant: "StoreA".to_owned(),
            date: datetime!(2025-01-13 12:00 UTC),
        }
    }

    #[test]
    fn create_succeeds() {
        let conn = get_test_connection();

        let result = create_transaction(&new_transaction("1", 1000), LIMIT, &conn);

        match result {
            Ok(transaction) => {
                assert_eq!(transaction.id, 1);
                assert_eq!(transaction.customer, "1");
                assert_eq!(transaction.amount, 1000);
                assert_eq!(transaction.merchant, "StoreA");
                assert_eq!(transaction.date, datetime!(2025-01-13 12:00 UTC));
            }
            Err(error) => panic!("Unexpected error: {error}"),
        }
    }

    #[test]
    fn create_assigns_unique_ids() {
        let conn = get_test_connection();

        let first = create_transaction(&new_transaction("1", 10), LIMIT, &conn).unwrap();
        let second = create_transaction(&new_transaction("1", 20), LIMIT, &conn).unwrap();

        assert_ne!(first.id, second.id);
    }

    #[test]
    fn date_keeps_offset_instant() {
        let conn = get_test_connection();
        let mut transaction = new_transaction("1", 10);
        transaction.date = datetime!(2025-01-13 09:30 -03:00);

        let created = create_transaction(&transaction, LIMIT, &conn).unwrap();
        let got = get_transaction(created.id, &conn).unwrap();

        assert_eq!(got.date, datetime!(2025-01-13 12:30 UTC));
    }

    #[test]
    fn create_fails_when_customer_is_at_limit() {
        let conn = get_test_connection();
        let limit = 3;
        for amount in 1..=limit {
            create_transaction(&new_transaction("C2", amount.into()), limit, &conn)
                .expect("Could not create transaction");
        }

        let result = create_transaction(&new_transaction("C2", 4), limit, &conn);

        assert_eq!(
            result,
            Err(Error::InvalidArgument(
                "No more than 3 transactions can be recorded".to_owned()
            ))
        );
        assert_eq!(count_transactions_by_customer("C2", &conn), Ok(limit));
    }

    #[test]
    fn limit_applies_per_customer() {
        let conn = get_test_connection();
        create_transaction(&new_transaction("C1", 1), 1, &conn).unwrap();

        let result = create_transaction(&new_transaction("C2", 1), 1, &conn);

        assert!(result.is_ok(), "got {result:?}");
    }

    #[test]
    fn get_missing_transaction_is_not_found() {
        let conn = get_test_connection();

        let result = get_transaction(42, &conn);

        assert_eq!(
            result,
            Err(Error::NotFound("Transaction not found with ID: 42".to_owned()))
        );
    }

    #[test]
    fn list_empty_table_is_empty() {
        let conn = get_test_connection();

        assert_eq!(list_transactions(&conn), Ok(vec![]));
    }

    #[test]
    fn list_returns_transactions_in_id_order() {
        let conn = get_test_connection();
        let want: Vec<_> = (1..=3)
            .map(|amount| create_transaction(&new_transaction("1", amount), LIMIT, &conn).unwrap())
            .collect();

        let got = list_transactions(&conn).unwrap();

        assert_eq!(got, want);
    }

    #[test]
    fn update_replaces_fields() {
        let conn = get_test_connection();
        let created = create_transaction(&new_transaction("1", 10), LIMIT, &conn).unwrap();
        let replacement = NewTransaction {
            customer: "2".to_owned(),
            amount: 20,
            merchant: "StoreB".to_owned(),
            date: datetime!(2025-01-14 08:00 UTC),
        };

        let updated = update_transaction(created.id, &replacement, LIMIT, &conn).unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.customer, "2");
        assert_eq!(updated.amount, 20);
        assert_eq!(updated.merchant, "StoreB");
        assert_eq!(get_transaction(created.id, &conn), Ok(updated));
    }

    #[test]
    fn update_missing_transaction_is_not_found() {
        let conn = get_test_connection();

        let result = update_transaction(7, &new_transaction("1", 10), LIMIT, &conn);

        assert_eq!(
            result,
            Err(Error::NotFound("Transaction not found with ID: 7".to_owned()))
        );
    }

    #[test]
    fn update_fails_when_customer_is_at_limit() {
        let conn = get_test_connection();
        let limit = 2;
        let first = create_transaction(&new_transaction("C2", 1), limit, &conn).unwrap();
        create_transaction(&new_transaction("C2", 2), limit, &conn).unwrap();

        let result = update_transaction(first.id, &new_transaction("C2", 5), limit, &conn);

        assert_eq!(
            result,
            Err(Error::InvalidArgument(
                "No more than 2 transactions can be recorded".to_owned()
            ))
        );
        assert_eq!(get_transaction(first.id, &conn).unwrap().amount, 1);
    }

    #[test]
    fn update_into_full_customer_fails() {
        let conn = get_test_connection();
        let limit = 1;
        create_transaction(&new_transaction("C2", 1), limit, &conn).unwrap();
        let other = create_transaction(&new_transaction("C3", 1), limit, &conn).unwrap();

        let result = update_transaction(other.id, &new_transaction("C2", 5), limit, &conn);

        assert!(matches!(result, Err(Error::InvalidArgument(_))), "got {result:?}");
        assert_eq!(get_transaction(other.id, &conn).unwrap().customer, "C3");
    }

    #[test]
    fn delete_removes_transaction() {
        let conn = get_test_connection();
        let created = create_transaction(&new_transaction("1", 10), LIMIT, &conn).unwrap();

        delete_transaction(created.id, &conn).expect("Could not delete transaction");

        assert!(matches!(
            get_transaction(created.id, &conn),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn delete_missing_transaction_is_not_found() {
        let conn = get_test_connection();

        assert_eq!(
            delete_transaction(3, &conn),
            Err(Error::NotFound("Transaction not found with ID: 3".to_owned()))
        );
    }

    #[test]
    fn count_by_customer() {
        let conn = get_test_connection();
        let want_count = 20;
        for i in 1..=want_count {
            create_transaction(&new_transaction("C1", i.into()), LIMIT, &conn)
                .expect("Could not create transaction");
        }
        create_transaction(&new_transaction("C9", 1), LIMIT, &conn).unwrap();

        let got_count = count_transactions_by_customer("C1", &conn).expect("Could not get count");

        assert_eq!(want_count, got_count);
    }
}
