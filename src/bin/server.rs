use std::{fs::OpenOptions, net::SocketAddr, process::ExitCode, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::HeaderValue,
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use ledger_rs::{
    AppState, DEFAULT_MAX_TRANSACTIONS_PER_CUSTOMER, RateLimitConfig, build_router,
    graceful_shutdown, logging_middleware, spawn_eviction_task,
};

/// The REST API server for ledger_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The only origin allowed to make cross-origin requests.
    #[arg(long, default_value = "http://localhost:3000")]
    allowed_origin: String,

    /// How many requests a client may make to one route per window.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    max_requests_per_window: u32,

    /// The length of a rate limit window in milliseconds.
    #[arg(long, default_value_t = 60_000, value_parser = clap::value_parser!(u64).range(1..))]
    window_ms: u64,

    /// How many transactions a single customer may have stored.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_TRANSACTIONS_PER_CUSTOMER,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_transactions_per_customer: u32,

    /// How often, in seconds, expired rate limit records are removed.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    eviction_interval_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let args = Args::parse();

    let allowed_origin = match HeaderValue::from_str(&args.allowed_origin) {
        Ok(origin) => origin,
        Err(error) => {
            tracing::error!("Invalid allowed origin {:?}: {error}", args.allowed_origin);
            return ExitCode::FAILURE;
        }
    };

    let conn = match Connection::open(&args.db_path) {
        Ok(conn) => conn,
        Err(error) => {
            tracing::error!("Could not open database at {}: {error}", args.db_path);
            return ExitCode::FAILURE;
        }
    };

    let rate_limit_config = RateLimitConfig {
        max_requests_per_window: args.max_requests_per_window,
        window: Duration::from_millis(args.window_ms),
        ..Default::default()
    };

    let state = match AppState::new(
        conn,
        rate_limit_config,
        args.max_transactions_per_customer,
        allowed_origin,
    ) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not initialize the database: {error}");
            return ExitCode::FAILURE;
        }
    };

    spawn_eviction_task(
        state.rate_limiter.clone(),
        Duration::from_secs(args.eviction_interval_secs),
    );

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state).layer(middleware::from_fn(logging_middleware)));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    tracing::info!("HTTP server listening on {}", addr);

    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await
    {
        tracing::error!("Server stopped unexpectedly: {error}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let debug_log = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .map(|log_file| {
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_ansi(false)
                .with_writer(Arc::new(log_file))
                .with_filter(filter::LevelFilter::DEBUG)
        });

    match debug_log {
        Ok(debug_log) => {
            tracing_subscriber::registry()
                .with(stdout_log)
                .with(debug_log)
                .init();
        }
        Err(error) => {
            tracing_subscriber::registry().with(stdout_log).init();
            tracing::warn!("Could not open debug.log, logging to stdout only: {error}");
        }
    }
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged where the error response is built.
        .on_failure(());

    router.layer(tracing_layer)
}
