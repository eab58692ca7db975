//! Batched mutations.
//!
//! Some calls take a list of targets (hosts, entities) that can be far longer
//! than one request accepts. [`apply_in_batches`] splits the list and runs one
//! [`converge`] per chunk, strictly in order, stopping at the first failure.
//! Chunks before the failing one stay applied; chunks after it are never sent.

use std::future::Future;

use tracing::info;

use crate::converge::{converge, Applied};
use crate::error::ProviderError;
use crate::poller::ConvergenceRequest;
use crate::status::{Observation, RemoteStatus};

/// Largest number of targets a single TEO batch call accepts.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Apply `mutate` to `items` in chunks of `batch_size`, converging each chunk
/// before sending the next.
///
/// Both closures receive the current chunk; `describe` also receives the
/// chunk's mutation response. A failure is wrapped in
/// [`ProviderError::Batch`] carrying the zero-based chunk index.
pub async fn apply_in_batches<'a, T, S, R, M, MFut, D, DFut>(
    operation: &str,
    items: &'a [T],
    batch_size: usize,
    request: &ConvergenceRequest<S>,
    mut mutate: M,
    mut describe: D,
) -> Result<Vec<Applied<R, S>>, ProviderError>
where
    S: RemoteStatus,
    M: FnMut(&'a [T]) -> MFut,
    MFut: Future<Output = Result<Option<R>, ProviderError>>,
    D: FnMut(&'a [T], &R) -> DFut,
    DFut: Future<Output = Result<Observation<S>, ProviderError>>,
{
    if batch_size == 0 {
        return Err(ProviderError::Validation(
            "batch size must be at least 1".to_string(),
        ));
    }

    let total = items.len().div_ceil(batch_size);
    let mut applied = Vec::with_capacity(total);
    for (index, chunk) in items.chunks(batch_size).enumerate() {
        info!(
            operation,
            id = request.id(),
            batch = index,
            total,
            size = chunk.len(),
            "applying batch"
        );
        let step = converge(
            operation,
            request,
            || mutate(chunk),
            |response| describe(chunk, response),
        )
        .await
        .map_err(|source| ProviderError::Batch {
            index,
            total,
            source: Box::new(source),
        })?;
        applied.push(step);
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::BindingStatus;
    use std::sync::Mutex;
    use std::time::Duration;

    fn request() -> ConvergenceRequest<BindingStatus> {
        ConvergenceRequest::to_reach("zone-1/tpl-1", &[BindingStatus::Online])
            .with_timeout(Duration::from_secs(10))
            .with_interval(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_batch_is_converged() {
        let items = ["a", "b", "c", "d", "e"];
        let mutated = &Mutex::new(Vec::new());
        let described = &Mutex::new(Vec::new());

        let applied = apply_in_batches(
            "BindSecurityTemplateToEntity",
            &items,
            2,
            &request(),
            move |chunk| async move {
                mutated.lock().unwrap().push(chunk.to_vec());
                Ok(Some(()))
            },
            move |chunk, _: &()| async move {
                described.lock().unwrap().push(chunk.to_vec());
                Ok(Observation::Found(BindingStatus::Online))
            },
        )
        .await
        .unwrap();

        assert_eq!(applied.len(), 3);
        assert_eq!(
            *mutated.lock().unwrap(),
            vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]
        );
        assert_eq!(*described.lock().unwrap(), *mutated.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_stops_later_batches() {
        let items = ["a", "b", "c", "d", "e"];
        let mutated = &Mutex::new(Vec::new());
        let described = &Mutex::new(Vec::new());

        let err = apply_in_batches(
            "BindSecurityTemplateToEntity",
            &items,
            2,
            &request(),
            move |chunk: &[&str]| async move {
                mutated.lock().unwrap().push(chunk.to_vec());
                if chunk.contains(&"c") {
                    Err(ProviderError::Api {
                        code: "InvalidParameter.Entity".into(),
                        message: "c is not a host".into(),
                    })
                } else {
                    Ok(Some(()))
                }
            },
            move |chunk: &[&str], _: &()| async move {
                described.lock().unwrap().push(chunk.to_vec());
                Ok(Observation::Found(BindingStatus::Online))
            },
        )
        .await
        .unwrap_err();

        match err {
            ProviderError::Batch {
                index,
                total,
                source,
            } => {
                assert_eq!(index, 1);
                assert_eq!(total, 3);
                assert!(matches!(*source, ProviderError::Api { .. }));
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            *mutated.lock().unwrap(),
            vec![vec!["a", "b"], vec!["c", "d"]]
        );
        assert_eq!(*described.lock().unwrap(), vec![vec!["a", "b"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_status_in_batch() {
        let items: Vec<String> = (0..450).map(|i| format!("host-{i}.example.com")).collect();
        let mutations = &Mutex::new(0usize);

        let err = apply_in_batches(
            "BindSecurityTemplateToEntity",
            &items,
            DEFAULT_BATCH_SIZE,
            &request(),
            move |chunk: &[String]| {
                let len = chunk.len();
                async move {
                    *mutations.lock().unwrap() += len;
                    Ok(Some(()))
                }
            },
            |chunk: &[String], _: &()| {
                let last = chunk.len() < DEFAULT_BATCH_SIZE;
                async move {
                    Ok(Observation::Found(if last {
                        BindingStatus::Fail
                    } else {
                        BindingStatus::Online
                    }))
                }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProviderError::Batch { index: 2, total: 3, .. }));
        assert_eq!(*mutations.lock().unwrap(), 450);
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let err = apply_in_batches(
            "BindSecurityTemplateToEntity",
            &["a"],
            0,
            &request(),
            |_| async { Ok(Some(())) },
            |_, _: &()| async { Ok(Observation::Found(BindingStatus::Online)) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_items_issue_nothing() {
        let items: [&str; 0] = [];
        let applied = apply_in_batches(
            "BindSecurityTemplateToEntity",
            &items,
            DEFAULT_BATCH_SIZE,
            &request(),
            |_| async { Ok(Some(())) },
            |_, _: &()| async { Ok(Observation::Found(BindingStatus::Online)) },
        )
        .await
        .unwrap();

        assert!(applied.is_empty());
    }
}
