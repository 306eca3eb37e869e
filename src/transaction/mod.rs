//! Transaction management for the ledger.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the request body used to create or update one
//! - The validation rules a transaction must pass before it is stored
//! - Database functions for storing, querying, and managing transactions
//! - Route handlers for the transaction API

mod core;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod get_endpoint;
mod list_endpoint;
mod validation;

#[cfg(test)]
mod test_utils;

pub use core::{
    NewTransaction, Transaction, TransactionRequest, TransactionState, create_transaction_table,
};
pub use create_endpoint::create_transaction_endpoint;
pub use delete_endpoint::delete_transaction_endpoint;
pub use edit_endpoint::update_transaction_endpoint;
pub use get_endpoint::get_transaction_endpoint;
pub use list_endpoint::get_all_transactions_endpoint;
