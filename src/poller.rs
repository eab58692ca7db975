//! Status poller.
//!
//! Repeatedly describes a remote object until it reports one of the target
//! statuses, reports a fatal status, or the budget runs out. How an absent
//! object is interpreted is declared by every request through [`Absence`];
//! the poller never infers it.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::retry::{retry_until, Attempt, RetryFailure};
use crate::status::{join_statuses, Observation, RemoteStatus};

/// Default convergence budget when the caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default time between two describe calls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// What an absent object means for a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    /// Not visible yet (read-after-write lag); keep polling.
    Retry,
    /// Gone; the wait is over.
    Converged,
}

/// What "done" means for one convergence wait.
#[derive(Debug, Clone)]
pub struct ConvergenceRequest<S> {
    id: String,
    targets: Vec<S>,
    fatal: Vec<S>,
    absence: Absence,
    timeout: Duration,
    interval: Duration,
}

impl<S: RemoteStatus> ConvergenceRequest<S> {
    /// Wait for the object `id` to report one of `targets`.
    ///
    /// Absence is retried.
    pub fn to_reach(id: impl Into<String>, targets: &[S]) -> Self {
        Self {
            id: id.into(),
            targets: targets.to_vec(),
            fatal: Vec::new(),
            absence: Absence::Retry,
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Wait for the object `id` to disappear.
    pub fn to_vanish(id: impl Into<String>) -> Self {
        Self {
            absence: Absence::Converged,
            ..Self::to_reach(id, &[])
        }
    }

    /// Relabel the wait, e.g. once the backend has assigned an ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Override how an absent object is interpreted.
    pub fn absent_means(mut self, absence: Absence) -> Self {
        self.absence = absence;
        self
    }

    /// Treat these statuses as fatal in addition to the `Failed` class.
    pub fn fatal_on(mut self, statuses: &[S]) -> Self {
        self.fatal.extend_from_slice(statuses);
        self
    }

    /// Set the total budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the time between describe calls.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Identifier used in logs and errors.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The absence policy.
    pub fn absence(&self) -> Absence {
        self.absence
    }

    /// The total budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The time between describe calls.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn is_fatal(&self, status: S) -> bool {
        status.is_fatal() || self.fatal.contains(&status)
    }

    pub(crate) fn timeout_error(&self, last_status: impl Into<String>) -> ProviderError {
        ProviderError::Timeout {
            id: self.id.clone(),
            targets: join_statuses(&self.targets),
            last_status: last_status.into(),
        }
    }
}

/// A successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converged<S> {
    /// What the final describe returned.
    pub observation: Observation<S>,
    /// Number of describe calls made.
    pub attempts: u32,
}

/// Poll `describe` until the request is satisfied.
pub async fn poll<S, D, Fut>(
    request: &ConvergenceRequest<S>,
    describe: D,
) -> Result<Converged<S>, ProviderError>
where
    S: RemoteStatus,
    D: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<S>, ProviderError>>,
{
    poll_until(request, Instant::now() + request.timeout, describe).await
}

/// Like [`poll`] but bounded by an absolute deadline shared with earlier work.
pub(crate) async fn poll_until<S, D, Fut>(
    request: &ConvergenceRequest<S>,
    deadline: Instant,
    mut describe: D,
) -> Result<Converged<S>, ProviderError>
where
    S: RemoteStatus,
    D: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<S>, ProviderError>>,
{
    let mut attempts = 0u32;
    let last_seen = &Mutex::new(None::<&'static str>);
    let result = retry_until(deadline, request.interval, || {
        attempts += 1;
        let attempt = attempts;
        let observed = describe();
        async move {
            let observed = observed.await;
            if let Ok(observation) = &observed {
                let mut seen = last_seen.lock().unwrap_or_else(PoisonError::into_inner);
                *seen = Some(observation.label());
            }
            assess(request, attempt, observed)
        }
    })
    .await;

    match result {
        Ok(observation) => {
            info!(
                id = %request.id,
                status = observation.label(),
                attempts,
                "converged"
            );
            Ok(Converged {
                observation,
                attempts,
            })
        },
        Err(RetryFailure::Aborted(err)) => Err(err),
        Err(RetryFailure::TimedOut { last, .. }) => {
            let err = if last.is_timeout() {
                last
            } else {
                let seen = last_seen.lock().unwrap_or_else(PoisonError::into_inner);
                request.timeout_error(format!("{} ({})", seen.unwrap_or("unknown"), last))
            };
            warn!(id = %request.id, attempts, error = %err, "gave up waiting");
            Err(err)
        },
    }
}

fn assess<S: RemoteStatus>(
    request: &ConvergenceRequest<S>,
    attempt: u32,
    observed: Result<Observation<S>, ProviderError>,
) -> Result<Observation<S>, Attempt<ProviderError>> {
    let observation = match observed {
        Ok(observation) => observation,
        Err(err) if err.is_retryable() => {
            warn!(id = %request.id, attempt, error = %err, "describe failed, retry...");
            return Err(Attempt::Retry(err));
        },
        Err(err) => return Err(Attempt::Abort(err)),
    };

    match observation {
        Observation::Found(status) if request.targets.contains(&status) => Ok(observation),
        Observation::Found(status) if request.is_fatal(status) => {
            Err(Attempt::Abort(ProviderError::FatalStatus {
                id: request.id.clone(),
                status: status.to_string(),
            }))
        },
        Observation::Absent if request.absence == Absence::Converged => Ok(observation),
        _ => {
            debug!(
                id = %request.id,
                attempt,
                "object status is {}, retry...",
                observation.label()
            );
            Err(Attempt::Retry(request.timeout_error(observation.label())))
        },
    }
}
