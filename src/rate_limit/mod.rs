//! Per-client, per-route request rate limiting.
//!
//! This module contains:
//! - The fixed-window [RateLimiter] and its configuration
//! - The middleware that gates API requests with the limiter
//! - A background task that evicts expired limiter records

mod limiter;
mod middleware;

pub use limiter::{
    RateLimitConfig, RateLimitDecision, RateLimitKey, RateLimiter, spawn_eviction_task,
};
pub use middleware::rate_limit_guard;
