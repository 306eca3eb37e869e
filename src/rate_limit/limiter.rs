//! A fixed-window rate limiter keyed by client and route.

use std::{
    collections::HashMap,
    hash::{BuildHasher, RandomState},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use axum::http::Method;
use tokio::task::JoinHandle;

use crate::endpoints;

/// The number of independently locked partitions of the key map.
const SHARD_COUNT: usize = 16;

/// Controls how many requests a client may make to one route and which
/// routes are not limited at all.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// The number of requests a client may make to a route in one window.
    pub max_requests_per_window: u32,
    /// How long a window lasts, measured from the first request in it.
    pub window: Duration,
    /// `GET` requests to these exact paths are never limited.
    pub exempt_paths: Vec<String>,
    /// `GET` requests to paths starting with one of these prefixes are never limited.
    pub exempt_prefixes: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: 3,
            window: Duration::from_millis(60_000),
            exempt_paths: vec![endpoints::ALL_TRANSACTIONS.to_owned()],
            exempt_prefixes: vec![endpoints::DOCUMENTATION_UI_PREFIX.to_owned()],
        }
    }
}

impl RateLimitConfig {
    /// Whether a request bypasses the rate limiter entirely.
    pub fn is_exempt(&self, method: &Method, path: &str) -> bool {
        if method != Method::GET {
            return false;
        }

        self.exempt_paths.iter().any(|exempt| exempt == path)
            || self
                .exempt_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Identifies whose requests are counted together: one client on one route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    client: String,
    route: String,
}

impl RateLimitKey {
    /// Create a key for `client` (e.g. an IP address) calling `route` (e.g. "POST /api/transaction/create").
    pub fn new(client: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            route: route.into(),
        }
    }
}

/// The outcome of asking the rate limiter whether to admit a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request was counted and may proceed.
    Allowed {
        /// How many more requests the key may make in the current window.
        remaining: u32,
    },
    /// The key has used up its window. Nothing was counted.
    Rejected {
        /// The time left until the key's current window ends.
        retry_after: Duration,
    },
}

#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    window_start: Instant,
}

impl RateLimitRecord {
    fn start(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.window_start)
    }
}

type Shard = Mutex<HashMap<RateLimitKey, RateLimitRecord>>;

/// Counts requests per [RateLimitKey] in fixed windows and rejects requests
/// beyond [RateLimitConfig::max_requests_per_window].
///
/// Keys are spread across several shards, each behind its own lock, so that
/// checking one key is atomic while unrelated keys rarely wait on each other.
/// Build one limiter at start up and share it behind an [Arc].
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    shards: Box<[Shard]>,
    hasher: RandomState,
}

impl RateLimiter {
    /// Create a rate limiter with no recorded requests.
    pub fn new(config: RateLimitConfig) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();

        Self {
            config,
            shards,
            hasher: RandomState::new(),
        }
    }

    /// The configuration the limiter was built with.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count a request for `key` made at `now` and decide whether to admit it.
    ///
    /// The first request for a key, and the first request at or after the end
    /// of the key's window, start a new window. A rejected request leaves the
    /// key's record untouched.
    pub fn check(&self, key: &RateLimitKey, now: Instant) -> RateLimitDecision {
        let max_requests = self.config.max_requests_per_window;
        let window = self.config.window;
        let mut records = self.lock_shard(key);

        let Some(record) = records.get_mut(key) else {
            records.insert(key.clone(), RateLimitRecord::start(now));

            return RateLimitDecision::Allowed {
                remaining: max_requests.saturating_sub(1),
            };
        };

        if record.elapsed(now) >= window {
            *record = RateLimitRecord::start(now);

            RateLimitDecision::Allowed {
                remaining: max_requests.saturating_sub(1),
            }
        } else if record.count < max_requests {
            record.count += 1;

            RateLimitDecision::Allowed {
                remaining: max_requests - record.count,
            }
        } else {
            RateLimitDecision::Rejected {
                retry_after: window.saturating_sub(record.elapsed(now)),
            }
        }
    }

    /// Remove the records whose window has ended by `now`, returning how many were removed.
    ///
    /// A key without a record behaves the same as a key whose window has
    /// ended, so eviction never changes a decision.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let window = self.config.window;

        self.shards
            .iter()
            .map(|shard| {
                let mut records = shard.lock().unwrap_or_else(PoisonError::into_inner);
                let before = records.len();
                records.retain(|_, record| record.elapsed(now) < window);
                before - records.len()
            })
            .sum()
    }

    /// The number of keys the limiter is currently tracking.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Whether the limiter is tracking no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard_index(&self, key: &RateLimitKey) -> usize {
        (self.hasher.hash_one(key) % self.shards.len() as u64) as usize
    }

    // Records are only replaced or incremented in place, so a shard is still
    // consistent if another thread panicked while holding its lock.
    fn lock_shard(
        &self,
        key: &RateLimitKey,
    ) -> MutexGuard<'_, HashMap<RateLimitKey, RateLimitRecord>> {
        self.shards[self.shard_index(key)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawn a task that evicts expired rate limit records every `period`.
///
/// The task runs until the runtime shuts down or the handle is aborted.
pub fn spawn_eviction_task(limiter: Arc<RateLimiter>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let evicted = limiter.evict_expired(Instant::now());

            if evicted > 0 {
                tracing::debug!(
                    "Evicted {evicted} expired rate limit records, {} remaining",
                    limiter.len()
                );
            }
        }
    })
}
