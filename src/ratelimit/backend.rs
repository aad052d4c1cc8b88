//! Rate limiter trait used by request handlers.

use std::sync::Arc;

use super::clock::Clock;
use super::counter::{Decision, RateLimitOptions};
use super::limiter::RateLimiter;
use crate::error::{RateLimitError, Result};

/// Trait for rate limiter implementations.
///
/// Request handlers depend on this rather than on [`RateLimiter`] directly so
/// they can be exercised against a stub.
pub trait RateLimiterBackend: Send + Sync {
    /// Count one call for `identifier` and report the decision.
    fn check(&self, identifier: &str, options: &RateLimitOptions) -> Decision;

    /// Like [`check`](Self::check), but turns an exceeded decision into
    /// [`RateLimitError::RateLimited`]. The call is counted either way.
    fn enforce(&self, identifier: &str, options: &RateLimitOptions) -> Result<Decision> {
        let decision = self.check(identifier, options);
        if decision.is_exceeded {
            return Err(RateLimitError::RateLimited {
                identifier: identifier.to_string(),
                reset_time: decision.reset_time,
            });
        }
        Ok(decision)
    }
}

impl<C: Clock> RateLimiterBackend for RateLimiter<C> {
    fn check(&self, identifier: &str, options: &RateLimitOptions) -> Decision {
        RateLimiter::check(self, identifier, options)
    }
}

impl<B: RateLimiterBackend + ?Sized> RateLimiterBackend for Arc<B> {
    fn check(&self, identifier: &str, options: &RateLimitOptions) -> Decision {
        (**self).check(identifier, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;
    use crate::ratelimit::key::RateLimitKey;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_enforce_allows_within_limit() {
        let limiter = RateLimiter::with_clock(ManualClock::new(0));
        let options = RateLimitOptions::new(2, 1_000);

        let decision = assert_ok!(limiter.enforce("ip1", &options));
        assert_eq!(decision.remaining, 1);
        assert_ok!(limiter.enforce("ip1", &options));
    }

    #[test]
    fn test_enforce_rejects_and_still_counts() {
        let limiter = RateLimiter::with_clock(ManualClock::new(0));
        let options = RateLimitOptions::new(1, 1_000);
        let key = RateLimitKey::new("login", "10.0.0.1");

        assert_ok!(limiter.enforce(key.as_str(), &options));
        let err = assert_err!(limiter.enforce(key.as_str(), &options));

        match err {
            RateLimitError::RateLimited {
                identifier,
                reset_time,
            } => {
                assert_eq!(identifier, "login:10.0.0.1");
                assert_eq!(reset_time, 1_000);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(limiter.record(key.as_str()).unwrap().count, 2);
    }

    #[test]
    fn test_backend_through_shared_handle() {
        let limiter: Arc<dyn RateLimiterBackend> =
            Arc::new(RateLimiter::with_clock(ManualClock::new(0)));
        let options = RateLimitOptions::new(0, 1_000);

        assert!(limiter.check("ip1", &options).is_exceeded);
        assert_err!(limiter.enforce("ip1", &options));
    }
}
