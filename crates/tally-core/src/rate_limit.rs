//! Sliding-window rate limiting.
//!
//! Every key keeps the timestamps of its admitted requests inside the
//! trailing window. A request is admitted while fewer than `limit`
//! timestamps remain after pruning; denied requests are not recorded.
//!
//! The table lives for the lifetime of the owning process and is not shared
//! between instances. Construct one limiter at startup and pass clones of
//! the handle to whatever needs it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Placeholder used in keys for callers without a verified account.
pub const ANONYMOUS: &str = "anonymous";

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Requests still admissible in the current window after this one.
    pub remaining: u32,
}

/// Build a limiter key from a scope, the caller's account (if any) and the
/// client address.
pub fn rate_key(scope: &str, account_id: Option<&str>, client_addr: &str) -> String {
    format!("{scope}:{}:{client_addr}", account_id.unwrap_or(ANONYMOUS))
}

/// In-process sliding-log rate limiter.
#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl RateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and record a request for `key`.
    pub async fn allow(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let timestamps = windows.entry(key.to_string()).or_default();

        prune(timestamps, now, window);

        let count = timestamps.len();
        if count >= limit as usize {
            return RateDecision {
                allowed: false,
                remaining: 0,
            };
        }

        timestamps.push_back(now);
        RateDecision {
            allowed: true,
            remaining: limit.saturating_sub(timestamps.len() as u32),
        }
    }

    /// Drop keys whose timestamps have all left `max_window`.
    ///
    /// Returns the number of keys removed.
    pub async fn purge_expired(&self, max_window: Duration) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();

        windows.retain(|_, timestamps| {
            prune(timestamps, now, max_window);
            !timestamps.is_empty()
        });

        before - windows.len()
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }

    /// Forget every key.
    pub async fn clear_all(&self) {
        self.windows.lock().await.clear();
    }
}

// A timestamp exactly `window` old is still inside the window.
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = timestamps.front() {
        if now.duration_since(*oldest) > window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
