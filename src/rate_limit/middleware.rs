//! Middleware that rejects requests once a client exceeds its rate limit.

use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    extract::{ConnectInfo, FromRef, Request, State, connect_info::MockConnectInfo},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    AppState, Error,
    rate_limit::{RateLimitDecision, RateLimitKey, RateLimiter},
};

/// The client identifier used when the transport does not report a peer address.
const UNKNOWN_CLIENT: &str = "unknown";

/// The state needed for the rate limit middleware.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    /// The limiter shared by every request handler.
    pub rate_limiter: Arc<RateLimiter>,
}

impl FromRef<AppState> for RateLimitState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            rate_limiter: state.rate_limiter.clone(),
        }
    }
}

/// Middleware function that counts each request against the limit for its
/// client and route, responding with 429 Too Many Requests once the limit is
/// reached.
///
/// Exempt routes skip the limiter without being counted.
///
/// **Note**: The client is identified by the peer IP address, which is only
/// available when the router is served with
/// `into_make_service_with_connect_info::<SocketAddr>()`. Otherwise all
/// requests share a single client identifier.
pub async fn rate_limit_guard(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    if state.rate_limiter.config().is_exempt(&method, &path) {
        return next.run(request).await;
    }

    let client = client_identifier(&request);
    let key = RateLimitKey::new(client.clone(), format!("{method} {path}"));

    match state.rate_limiter.check(&key, Instant::now()) {
        RateLimitDecision::Allowed { remaining } => {
            tracing::debug!("Admitted {method} {path} for {client}, {remaining} remaining");
            next.run(request).await
        }
        RateLimitDecision::Rejected { retry_after } => {
            tracing::warn!("Rate limit exceeded for {client} on {method} {path}");
            Error::RateLimitExceeded { retry_after }
                .at(&path)
                .into_response()
        }
    }
}

fn client_identifier(request: &Request) -> String {
    let extensions = request.extensions();

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| *address)
        .or_else(|| {
            extensions
                .get::<MockConnectInfo<SocketAddr>>()
                .map(|MockConnectInfo(address)| *address)
        })
        .map(|address| address.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}
