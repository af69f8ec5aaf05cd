//! Per-client fixed-window admission guard.
//!
//! # Algorithm
//! ```text
//! check_and_record(key, now):
//!     no entry, or now > reset_at  → entry = { count: 1, reset_at: now + window }  → Allow
//!     otherwise                    → count += 1
//!                                    count > limit → Deny(ceil((reset_at - now) / 1000))
//!                                    else          → Allow
//! ```
//!
//! The window resets absolutely on the first request after expiry; it does
//! not slide. The whole read-modify-write for a key runs under that key's
//! shard lock, so concurrent requests for one client never admit more than
//! `limit` requests per window.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Default number of requests admitted per key per window.
pub const DEFAULT_LIMIT: u64 = 100;

/// Default window length in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Counter state for a single client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests observed in the current window.
    pub count: u64,
    /// Millisecond timestamp at which the current window ends.
    pub reset_at: u64,
}

impl RateLimitEntry {
    fn fresh(now: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            reset_at: now.saturating_add(window_ms),
        }
    }

    fn is_expired(&self, now: u64) -> bool {
        now > self.reset_at
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allow,
    /// The request is over the limit for the current window.
    Deny {
        /// Whole seconds until the window resets, rounded up.
        retry_after_secs: u64,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Turn a denial into an error so callers can short-circuit with `?`.
    pub fn into_result(self) -> Result<(), RateLimitExceeded> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny { retry_after_secs } => Err(RateLimitExceeded { retry_after_secs }),
        }
    }
}

/// Policy rejection raised for a client that exhausted its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Rate limit exceeded. Try again after {retry_after_secs}s.")]
pub struct RateLimitExceeded {
    pub retry_after_secs: u64,
}

impl RateLimitExceeded {
    pub const STATUS: StatusCode = StatusCode::TOO_MANY_REQUESTS;

    /// JSON body sent to the client.
    pub fn body(&self) -> RejectionBody {
        RejectionBody {
            status_code: Self::STATUS.as_u16(),
            error: "Too Many Requests",
            message: self.to_string(),
        }
    }
}

/// Wire shape of a 429 rejection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionBody {
    pub status_code: u16,
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let mut response = (Self::STATUS, Json(self.body())).into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        response
    }
}

/// In-memory fixed-window rate limiter keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    store: DashMap<String, RateLimitEntry>,
    limit: u64,
    window_ms: u64,
    clock: MonotonicClock,
}

impl RateLimiter {
    /// Create a limiter admitting `limit` requests per `window_ms` per key.
    pub fn new(limit: u64, window_ms: u64) -> Self {
        Self {
            store: DashMap::new(),
            limit,
            window_ms,
            clock: MonotonicClock::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.limit, config.window_ms)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Record one request for `key` at `now` (ms since epoch) and decide
    /// whether it is admitted.
    pub fn check_and_record(&self, key: &str, now: u64) -> Decision {
        match self.store.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(RateLimitEntry::fresh(now, self.window_ms));
                Decision::Allow
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if entry.is_expired(now) {
                    *entry = RateLimitEntry::fresh(now, self.window_ms);
                    return Decision::Allow;
                }

                entry.count = entry.count.saturating_add(1);
                if entry.count > self.limit {
                    Decision::Deny {
                        retry_after_secs: entry.reset_at.saturating_sub(now).div_ceil(1000),
                    }
                } else {
                    Decision::Allow
                }
            }
        }
    }

    /// Same as [`check_and_record`](Self::check_and_record) using the
    /// limiter's own clock.
    pub fn check(&self, key: &str) -> Decision {
        self.check_and_record(key, self.now())
    }

    /// Milliseconds since the epoch, never moving backwards.
    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Snapshot of the entry for `key`, if any.
    pub fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.store.get(key).map(|e| *e)
    }

    /// Number of keys currently held in the store.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Drop every entry whose window ended before `now`. Returns how many
    /// entries were removed.
    pub fn sweep_expired(&self, now: u64) -> usize {
        let mut removed = 0;
        self.store.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Periodically sweep expired entries until shutdown is signalled.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        tracing::info!(interval_secs = interval.as_secs(), "Rate limit sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep_expired(self.now());
                    let tracked = self.tracked_keys();
                    metrics::record_sweep(removed, tracked);
                    if removed > 0 {
                        tracing::debug!(removed, tracked, "Swept expired rate limit entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW_MS)
    }
}

/// Epoch milliseconds read once from the wall clock, then advanced by an
/// `Instant`, so wall-clock steps cannot stretch a window.
#[derive(Debug, Clone, Copy)]
struct MonotonicClock {
    origin: Instant,
    origin_ms: u64,
}

impl MonotonicClock {
    fn new() -> Self {
        let origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            origin: Instant::now(),
            origin_ms,
        }
    }

    fn now_millis(&self) -> u64 {
        self.origin_ms
            .saturating_add(self.origin.elapsed().as_millis() as u64)
    }
}
