//! The apply-then-converge step.
//!
//! Every resource that provisions an asynchronously activated object goes
//! through [`converge`]: issue one mutation, then poll until the object
//! settles. Multi-step flows (stop, wait, delete, wait) are sequences of
//! `converge` calls; each step starts only after the previous one returned.

use std::future::Future;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::poller::{poll_until, Converged, ConvergenceRequest};
use crate::retry::{retry_until, Attempt, RetryFailure};
use crate::status::{Observation, RemoteStatus};

/// A mutation that was applied and has converged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<R, S> {
    /// The mutation's response.
    pub response: R,
    /// The final poll result.
    pub converged: Converged<S>,
}

/// Apply `mutate`, then poll `describe` until `request` is satisfied.
///
/// `operation` names the API call for logs and errors. The mutation is
/// repeated only on retryable errors; any other error, or an empty response,
/// aborts before a single describe is issued. `describe` receives the
/// mutation response so it can reach identifiers assigned by the backend.
/// Mutation and polling share one budget of `request.timeout()`.
pub async fn converge<S, R, M, MFut, D, DFut>(
    operation: &str,
    request: &ConvergenceRequest<S>,
    mutate: M,
    mut describe: D,
) -> Result<Applied<R, S>, ProviderError>
where
    S: RemoteStatus,
    M: FnMut() -> MFut,
    MFut: Future<Output = Result<Option<R>, ProviderError>>,
    D: FnMut(&R) -> DFut,
    DFut: Future<Output = Result<Observation<S>, ProviderError>>,
{
    let deadline = Instant::now() + request.timeout();
    let response = mutate_until(operation, request, deadline, mutate).await?;
    let converged = poll_until(request, deadline, || describe(&response)).await?;
    Ok(Applied {
        response,
        converged,
    })
}

/// Like [`converge`] for mutations that create the object.
///
/// Until the backend answers, `request` is labelled with whatever the caller
/// knows (usually a display name). Polling is then labelled with the
/// identifier `identify` extracts from the response.
pub async fn converge_created<S, R, M, MFut, I, D, DFut>(
    operation: &str,
    request: &ConvergenceRequest<S>,
    mutate: M,
    identify: I,
    mut describe: D,
) -> Result<Applied<R, S>, ProviderError>
where
    S: RemoteStatus,
    M: FnMut() -> MFut,
    MFut: Future<Output = Result<Option<R>, ProviderError>>,
    I: FnOnce(&R) -> String,
    D: FnMut(&R) -> DFut,
    DFut: Future<Output = Result<Observation<S>, ProviderError>>,
{
    let deadline = Instant::now() + request.timeout();
    let response = mutate_until(operation, request, deadline, mutate).await?;
    let keyed = request.clone().with_id(identify(&response));
    debug!(operation, name = request.id(), id = keyed.id(), "object created");
    let converged = poll_until(&keyed, deadline, || describe(&response)).await?;
    Ok(Applied {
        response,
        converged,
    })
}

async fn mutate_until<S, R, M, MFut>(
    operation: &str,
    request: &ConvergenceRequest<S>,
    deadline: Instant,
    mut mutate: M,
) -> Result<R, ProviderError>
where
    S: RemoteStatus,
    M: FnMut() -> MFut,
    MFut: Future<Output = Result<Option<R>, ProviderError>>,
{
    debug!(operation, id = request.id(), "issuing mutation");
    retry_until(deadline, request.interval(), || {
        let issued = mutate();
        async move {
            match issued.await {
                Ok(Some(response)) => Ok(response),
                Ok(None) => Err(Attempt::Abort(ProviderError::MalformedResponse {
                    operation: operation.to_string(),
                })),
                Err(err) if err.is_retryable() => {
                    warn!(operation, error = %err, "mutation failed, retry...");
                    Err(Attempt::Retry(err))
                },
                Err(err) => Err(Attempt::Abort(err)),
            }
        }
    })
    .await
    .map_err(|failure| match failure {
        RetryFailure::Aborted(err) => err,
        RetryFailure::TimedOut { last, .. } => {
            request.timeout_error(format!("unknown ({} not accepted: {})", operation, last))
        },
    })
}
