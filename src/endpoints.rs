//! The API endpoints URIs.
//!
//! Endpoints that take a parameter, e.g., '/api/transaction/update/{transaction_id}',
//! are matched by axum's path syntax.

/// The route for listing every transaction.
pub const ALL_TRANSACTIONS: &str = "/api/transaction/allTransactions";
/// The route for fetching a single transaction.
pub const TRANSACTION: &str = "/api/transaction/{transaction_id}";
/// The route for creating a transaction.
pub const CREATE_TRANSACTION: &str = "/api/transaction/create";
/// The route for updating a transaction.
pub const UPDATE_TRANSACTION: &str = "/api/transaction/update/{transaction_id}";
/// The route for deleting a transaction.
pub const DELETE_TRANSACTION: &str = "/api/transaction/delete/{transaction_id}";
/// The path prefix of the API documentation UI.
pub const DOCUMENTATION_UI_PREFIX: &str = "/swagger-ui/";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns
/// the original `endpoint_path`.
#[cfg(test)]
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::ALL_TRANSACTIONS);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::CREATE_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::UPDATE_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::DELETE_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::DOCUMENTATION_UI_PREFIX);
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint(endpoints::UPDATE_TRANSACTION, 1);

        assert_eq!(formatted_path, "/api/transaction/update/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint("/hello/{world}/bye", 1);

        assert_eq!(formatted_path, "/hello/1/bye");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
