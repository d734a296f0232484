//! Fixed-window rate limiting keyed by client identity.
//!
//! Each [`RateLimiter`] owns one [`Limit`] and its own key namespace, so every
//! endpoint gets an independent counter. The map lives behind a mutex and
//! every check is a single exclusive read-modify-write: parallel requests
//! from the same key cannot slip past `max_attempts`.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::DEFAULT_MAX_TRACKED;

/// Longest accepted window: 7 days.
pub const MAX_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Attempts allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub max_attempts: u32,
    pub window_ms: i64,
}

impl Limit {
    /// 10 attempts per 5 minutes.
    pub const LOGIN: Limit = Limit::new(10, 5 * 60 * 1000);
    /// 60 requests per minute.
    pub const DATA_READ: Limit = Limit::per_minute(60);
    /// 30 requests per minute.
    pub const DATA_WRITE: Limit = Limit::per_minute(30);

    /// `window_ms` is clamped to `1..=MAX_WINDOW_MS`.
    pub const fn new(max_attempts: u32, window_ms: i64) -> Self {
        let window_ms = if window_ms < 1 {
            1
        } else if window_ms > MAX_WINDOW_MS {
            MAX_WINDOW_MS
        } else {
            window_ms
        };
        Self {
            max_attempts,
            window_ms,
        }
    }

    pub const fn per_minute(max_attempts: u32) -> Self {
        Self::new(max_attempts, 60 * 1000)
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    reset_at_ms: i64,
}

/// Fixed-window counter shared by all request handlers of one endpoint.
#[derive(Debug)]
pub struct RateLimiter {
    limit: Limit,
    max_tracked: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new(limit: Limit) -> Self {
        Self {
            limit,
            max_tracked: DEFAULT_MAX_TRACKED,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cap the number of client keys held in memory.
    pub fn with_max_tracked(mut self, max_tracked: usize) -> Self {
        self.max_tracked = max_tracked.max(1);
        self
    }

    pub fn limit(&self) -> Limit {
        self.limit
    }

    /// Count an attempt for `key` against the wall clock.
    pub fn check_and_consume(&self, key: &str) -> bool {
        self.check_and_consume_at(key, crate::now_millis())
    }

    /// Count an attempt for `key` at `now_ms`.
    ///
    /// Returns `true` when the attempt is allowed. A denied attempt does not
    /// increment the counter further.
    pub fn check_and_consume_at(&self, key: &str, now_ms: i64) -> bool {
        let mut entries = self.entries.lock().expect("rate limit table poisoned");

        let fresh = Entry {
            count: 1,
            reset_at_ms: now_ms.saturating_add(self.limit.window_ms),
        };

        if let Some(entry) = entries.get_mut(key) {
            if now_ms > entry.reset_at_ms {
                *entry = fresh;
                return true;
            }
            if entry.count >= self.limit.max_attempts {
                log::warn!("Rate limit reached for client {}", key);
                return false;
            }
            entry.count += 1;
            return true;
        }

        if entries.len() >= self.max_tracked {
            self.make_room(&mut entries, now_ms);
        }
        entries.insert(key.to_string(), fresh);
        true
    }

    /// Forget `key`, e.g. after a successful login.
    pub fn reset(&self, key: &str) {
        self.entries
            .lock()
            .expect("rate limit table poisoned")
            .remove(key);
    }

    /// Attempts counted for `key` in its current window.
    pub fn attempts(&self, key: &str) -> u32 {
        self.entries
            .lock()
            .expect("rate limit table poisoned")
            .get(key)
            .map(|e| e.count)
            .unwrap_or(0)
    }

    /// Drop every entry whose window has closed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(crate::now_millis())
    }

    pub fn purge_expired_at(&self, now_ms: i64) -> usize {
        let mut entries = self.entries.lock().expect("rate limit table poisoned");
        let before = entries.len();
        entries.retain(|_, e| now_ms <= e.reset_at_ms);
        before - entries.len()
    }

    /// Number of client keys currently held.
    pub fn tracked_count(&self) -> usize {
        self.entries.lock().expect("rate limit table poisoned").len()
    }

    fn make_room(&self, entries: &mut HashMap<String, Entry>, now_ms: i64) {
        entries.retain(|_, e| now_ms <= e.reset_at_ms);
        if entries.len() < self.max_tracked {
            return;
        }

        // Still full of live windows: evict the one closest to expiry.
        let oldest = entries
            .iter()
            .min_by_key(|(_, e)| e.reset_at_ms)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            entries.remove(&key);
        }
    }
}
