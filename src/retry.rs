//! Fixed-interval retry loop bounded by a deadline.
//!
//! Every asynchronous wait in the provider bottoms out here. An operation
//! reports each failure as either [`Attempt::Retry`] (try again after the
//! interval) or [`Attempt::Abort`] (give up now). The loop never sleeps past
//! the point where the deadline has already been exceeded, so a caller with a
//! budget of `timeout` observes a failure no later than `timeout + interval`.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Outcome of a single failed attempt.
#[derive(Debug)]
pub enum Attempt<E> {
    /// Transient failure; the loop sleeps and calls the operation again.
    Retry(E),
    /// Permanent failure; the loop stops immediately.
    Abort(E),
}

/// Why [`retry_until`] gave up.
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The operation reported a permanent failure.
    Aborted(E),
    /// The deadline passed while the operation kept failing transiently.
    TimedOut {
        /// The last transient failure reported.
        last: E,
        /// How many times the operation was invoked.
        attempts: u32,
    },
}

/// Call `op` until it succeeds, aborts, or `deadline` passes.
///
/// The operation is always invoked at least once, even if the deadline is
/// already in the past.
pub async fn retry_until<T, E, F, Fut>(
    deadline: Instant,
    interval: Duration,
    mut op: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(Attempt::Abort(err)) => return Err(RetryFailure::Aborted(err)),
            Err(Attempt::Retry(err)) => {
                if Instant::now() >= deadline {
                    return Err(RetryFailure::TimedOut {
                        last: err,
                        attempts,
                    });
                }
                trace!(attempts, ?interval, "attempt failed transiently, sleeping");
                tokio::time::sleep(interval).await;
            },
        }
    }
}

/// Convenience wrapper computing the deadline from a timeout.
pub async fn retry<T, E, F, Fut>(
    timeout: Duration,
    interval: Duration,
    op: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
{
    retry_until(Instant::now() + timeout, interval, op).await
}
