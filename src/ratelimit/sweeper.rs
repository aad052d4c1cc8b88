//! Background removal of expired rate limit records.
//!
//! The limiter never drops records on its own. Long-running processes that see
//! many distinct identifiers run this task to keep the store bounded by the
//! number of identifiers active within one window.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::clock::Clock;
use super::limiter::RateLimiter;

/// Shortest sweep period accepted; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Spawn a task that calls [`RateLimiter::sweep_expired`] every `period`
/// until `shutdown` resolves.
///
/// The task resolves to the total number of records it removed.
pub fn spawn_sweeper<C, F>(
    limiter: Arc<RateLimiter<C>>,
    period: Duration,
    shutdown: F,
) -> JoinHandle<usize>
where
    C: Clock + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let period = period.max(MIN_PERIOD);

    tokio::spawn(async move {
        info!(period_ms = period.as_millis() as u64, "Starting expiry sweeper");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        tokio::pin!(shutdown);
        let mut total = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(removed = total, "Expiry sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = limiter.sweep_expired();
                    debug!(removed = removed, tracked = limiter.len(), "Sweep complete");
                    total += removed;
                }
            }
        }

        total
    })
}
