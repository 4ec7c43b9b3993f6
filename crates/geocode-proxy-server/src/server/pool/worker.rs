use super::request::{Reply, WorkRequest};
use crate::server::telemetry::{increment_provider_calls, increment_provider_errors};
use core::time::Duration;
use geocode_proxy_core::{
    error::ResolveError,
    provider::Provider,
    types::{GeocodeRequest, GeocodeResult},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Worker task pulling [`WorkRequest`]s off the pool's shared queue.
///
/// All workers share one receiver, so whichever worker is idle takes the next
/// request. A worker moves between two states:
///
/// - **Idle**: waiting on the queue (or on `shutdown_token`).
/// - **Processing**: calling the provider for one address.
///
/// It terminates from the idle state only, when one of the following
/// happens:
///
/// - it dequeues [`WorkRequest::Shutdown`] (acknowledged on the oneshot),
/// - `shutdown_token` is cancelled,
/// - the queue reports that it is closed *and* empty. A received message is
///   always `Ok(_)`, so a closed queue cannot be mistaken for work.
///
/// Every dequeued [`WorkRequest::Resolve`] yields exactly one [`Reply`],
/// whatever the provider does.
pub async fn worker_loop(
    worker_id: usize,
    rx: async_channel::Receiver<WorkRequest>,
    provider: Arc<dyn Provider>,
    provider_timeout: Duration,
    shutdown_token: CancellationToken,
) {
    tracing::trace!("Worker {worker_id} started");

    loop {
        let work = tokio::select! {
            biased;
            () = shutdown_token.cancelled() => {
                tracing::debug!("Worker {worker_id} shutdown via cancellation token");
                break;
            }
            work = rx.recv() => work,
        };

        match work {
            Ok(WorkRequest::Resolve {
                index,
                request,
                reply,
            }) => {
                let result = resolve_with_deadline(provider.as_ref(), request, provider_timeout).await;
                // The batch may have given up on us (pool closed mid-flight);
                // the result is simply dropped then.
                if reply.send(Reply { index, result }).await.is_err() {
                    tracing::debug!("Worker {worker_id} reply dropped, batch no longer waiting");
                }
            }
            Ok(WorkRequest::Shutdown { response }) => {
                tracing::debug!("Worker {worker_id} received shutdown signal");
                if response.send(()).is_err() {
                    tracing::error!("Worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
            Err(_closed) => {
                tracing::debug!("Worker {worker_id} queue closed");
                break;
            }
        }
    }

    tracing::trace!("Worker {worker_id} stopped");
}

/// Calls the provider for one request, bounded by `deadline`, and folds every
/// outcome into a [`GeocodeResult`].
///
/// Used by pool workers and by the batch coordinator for the first address
/// of a batch, which is resolved inline.
pub async fn resolve_with_deadline(
    provider: &dyn Provider,
    request: GeocodeRequest,
    deadline: Duration,
) -> GeocodeResult {
    increment_provider_calls();
    tracing::debug!("Geocoding address '{}' ({})", request.address, request.id);

    let outcome = tokio::time::timeout(deadline, provider.resolve(&request.address)).await;

    match outcome {
        Ok(Ok(location)) => {
            tracing::debug!(
                "Address '{}' ({}) geocoded {{{}, {}}}",
                request.address,
                request.id,
                location.lat,
                location.lng
            );
            GeocodeResult::located(request, location)
        }
        Ok(Err(e)) => {
            let error = ResolveError::from(e);
            tracing::error!(
                "Error geocoding address '{}' ({}). {}",
                request.address,
                request.id,
                error
            );
            increment_provider_errors(error_kind(&error));
            GeocodeResult::failed(request, error)
        }
        Err(_elapsed) => {
            tracing::error!(
                "Geocoding address '{}' ({}) timed out after {:?}",
                request.address,
                request.id,
                deadline
            );
            increment_provider_errors("timeout");
            GeocodeResult::failed(
                request,
                ResolveError::transport(format!("provider call timed out after {deadline:?}")),
            )
        }
    }
}

const fn error_kind(error: &ResolveError) -> &'static str {
    match error {
        ResolveError::Unresolved => "unresolved",
        ResolveError::ProviderRateLimited => "rate_limited",
        ResolveError::QuotaExceeded => "quota",
        ResolveError::Transport { .. } => "transport",
    }
}
