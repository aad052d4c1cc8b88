//! Fixed-window counter records and the values exchanged with callers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-call limit settings.
///
/// No bounds are enforced: a zero or negative `limit` makes every call
/// exceeded, and the window length is taken as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitOptions {
    /// Maximum calls allowed in one window
    pub limit: i64,
    /// Window length in milliseconds
    pub window_ms: i64,
}

impl RateLimitOptions {
    /// Create options from a limit and a window length in milliseconds.
    pub fn new(limit: i64, window_ms: i64) -> Self {
        Self { limit, window_ms }
    }

    /// Create options from a limit and a window `Duration`.
    pub fn per(limit: i64, window: Duration) -> Self {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        Self { limit, window_ms }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Whether this call pushed the count past the limit
    pub is_exceeded: bool,
    /// Calls left in the current window, never negative
    pub remaining: u64,
    /// End of the current window, in milliseconds since the Unix epoch
    pub reset_time: i64,
}

impl Decision {
    /// Time left until the window resets, measured from `now_ms`.
    pub fn retry_after(&self, now_ms: i64) -> Duration {
        let ms = self.reset_time.saturating_sub(now_ms).max(0);
        Duration::from_millis(ms as u64)
    }
}

/// Window state for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Calls counted in the current window
    pub count: u64,
    /// End of the current window, in milliseconds since the Unix epoch
    pub reset_time: i64,
}

impl RateLimitRecord {
    /// A fresh record whose window ends `window_ms` after `now_ms`.
    pub fn new(now_ms: i64, window_ms: i64) -> Self {
        Self {
            count: 0,
            reset_time: now_ms.saturating_add(window_ms),
        }
    }

    /// Whether the window has ended. The boundary instant itself still
    /// belongs to the current window.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.reset_time
    }

    /// Start a new window at `now_ms`.
    pub fn roll(&mut self, now_ms: i64, window_ms: i64) {
        self.count = 0;
        self.reset_time = now_ms.saturating_add(window_ms);
    }

    /// Count one call, rolling the window first if it has ended.
    ///
    /// The count is incremented even when the limit is already exceeded.
    /// Returns whether the window rolled over.
    pub fn hit(&mut self, now_ms: i64, window_ms: i64) -> bool {
        let rolled = self.is_expired(now_ms);
        if rolled {
            self.roll(now_ms, window_ms);
        }
        self.count = self.count.saturating_add(1);
        rolled
    }

    /// Whether the current count is over `limit`.
    pub fn is_exceeded(&self, limit: i64) -> bool {
        match u64::try_from(limit) {
            Ok(limit) => self.count > limit,
            Err(_) => true,
        }
    }

    /// `max(0, limit - count)`.
    pub fn remaining(&self, limit: i64) -> u64 {
        u64::try_from(limit)
            .map(|limit| limit.saturating_sub(self.count))
            .unwrap_or(0)
    }

    /// The decision reported for the current state under `limit`.
    pub fn decision(&self, limit: i64) -> Decision {
        Decision {
            is_exceeded: self.is_exceeded(limit),
            remaining: self.remaining(limit),
            reset_time: self.reset_time,
        }
    }
}
