//! Core fixed-window rate limiter.

use dashmap::DashMap;
use tracing::{debug, info, trace};

use super::clock::{Clock, SystemClock};
use super::counter::{Decision, RateLimitOptions, RateLimitRecord};

/// The core rate limiter that owns one window record per identifier.
///
/// Records are created on first use and rolled lazily: an expired window is
/// only reset by the next call for the same identifier. Nothing is removed
/// unless [`RateLimiter::sweep_expired`] (or `reset`/`clear`) is called, so
/// the store grows with the number of distinct identifiers seen.
///
/// The read-modify-write in [`RateLimiter::check`] runs under the store's
/// per-shard entry lock, so the limiter can be shared across threads.
pub struct RateLimiter<C: Clock = SystemClock> {
    /// Window records indexed by identifier
    records: DashMap<String, RateLimitRecord>,
    /// Source of "now"
    clock: C,
}

impl RateLimiter<SystemClock> {
    /// Create a new rate limiter using the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a new rate limiter reading time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            records: DashMap::new(),
            clock,
        }
    }

    /// Count one call for `identifier` and report whether it is over the limit.
    ///
    /// The call is always counted, including when it exceeds the limit; callers
    /// decide what to do with an exceeded decision.
    pub fn check(&self, identifier: &str, options: &RateLimitOptions) -> Decision {
        let now = self.clock.now_ms();

        trace!(
            identifier = identifier,
            limit = options.limit,
            window_ms = options.window_ms,
            "Checking rate limit"
        );

        let (decision, count) = {
            let mut record = self
                .records
                .entry(identifier.to_owned())
                .or_insert_with(|| {
                    debug!(
                        identifier = identifier,
                        window_ms = options.window_ms,
                        "Creating new rate limit record"
                    );
                    RateLimitRecord::new(now, options.window_ms)
                });

            if record.hit(now, options.window_ms) {
                debug!(
                    identifier = identifier,
                    reset_time = record.reset_time,
                    "Rate limit window rolled over"
                );
            }

            (record.decision(options.limit), record.count)
        };

        if decision.is_exceeded {
            debug!(
                identifier = identifier,
                count = count,
                limit = options.limit,
                reset_time = decision.reset_time,
                "Rate limit exceeded"
            );
        }

        decision
    }

    /// Get a copy of the record stored for `identifier`.
    ///
    /// Returns `None` if the identifier has never been checked (or was removed).
    pub fn record(&self, identifier: &str) -> Option<RateLimitRecord> {
        self.records.get(identifier).map(|r| *r)
    }

    /// Forget the record for `identifier`. Returns whether one existed.
    pub fn reset(&self, identifier: &str) -> bool {
        self.records.remove(identifier).is_some()
    }

    /// Remove every record whose window has already ended.
    ///
    /// A removed record would have been rolled on its next check anyway, so
    /// sweeping never changes a decision. Returns the number of records removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;

        self.records.retain(|_, record| {
            let keep = !record.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            info!(
                removed = removed,
                remaining = self.records.len(),
                "Swept expired rate limit records"
            );
        }

        removed
    }

    /// Clear all records.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Get the number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no identifiers are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The clock this limiter reads time from.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}
