//! Application router configuration with the rate limited API routes.

use axum::{
    Router,
    extract::OriginalUri,
    http::{Method, header::RETRY_AFTER},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    ApiError, AppState, Error, endpoints,
    rate_limit::rate_limit_guard,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_all_transactions_endpoint,
        get_transaction_endpoint, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Every route is gated by the rate limiter in `state`, except for the
/// routes its configuration exempts. Cross-origin requests are only allowed
/// from `state.allowed_origin`.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.allowed_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .expose_headers([RETRY_AFTER]);

    Router::new()
        .route(
            endpoints::ALL_TRANSACTIONS,
            get(get_all_transactions_endpoint),
        )
        .route(endpoints::TRANSACTION, get(get_transaction_endpoint))
        .route(
            endpoints::CREATE_TRANSACTION,
            post(create_transaction_endpoint),
        )
        .route(
            endpoints::UPDATE_TRANSACTION,
            put(update_transaction_endpoint),
        )
        .route(
            endpoints::DELETE_TRANSACTION,
            delete(delete_transaction_endpoint),
        )
        .method_not_allowed_fallback(get_405_method_not_allowed)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_guard,
        ))
        .fallback(get_404_not_found)
        // CORS goes last so that preflight requests never reach the rate limiter.
        .layer(cors)
        .with_state(state)
}

async fn get_404_not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    Error::NotFound(format!("No route for {}", uri.path())).at(uri.path())
}

async fn get_405_method_not_allowed(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    Error::MethodNotAllowed(format!("{method} is not allowed for {}", uri.path())).at(uri.path())
}
