use crate::server::{
    pool::{Reply, WorkRequest, WorkerPool, worker::resolve_with_deadline},
    quota::QuotaLedger,
    telemetry::{
        increment_batch_aborts, increment_batches, increment_quota_rejections,
        record_batch_duration, record_batch_size,
    },
};
use core::time::Duration;
use geocode_proxy_core::{
    Error,
    error::ResolveError,
    provider::Provider,
    types::{GeocodeRequest, GeocodeResult},
};
use std::{collections::BTreeMap, sync::Arc, time::Instant};
use tokio::sync::mpsc;

/// How the results of a batch are ordered in the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ResultOrder {
    /// First address, then quota-rejected addresses in arrival order, then
    /// pool-resolved addresses in the order the workers finished them.
    #[default]
    Completion,
    /// Same order as the addresses in the request.
    Input,
}

/// Everything a batch produced: one result per admitted or rejected address,
/// plus an optional batch-level error.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<GeocodeResult>,
    pub error: Option<Error>,
}

/// Runs batches against the shared [`WorkerPool`] and [`QuotaLedger`].
///
/// The coordinator holds no per-batch state; one instance is shared by all
/// concurrent calls.
pub struct BatchCoordinator {
    pool: Arc<WorkerPool>,
    ledger: Arc<QuotaLedger>,
    provider: Arc<dyn Provider>,
    provider_timeout: Duration,
    order: ResultOrder,
}

impl BatchCoordinator {
    pub fn new(
        pool: Arc<WorkerPool>,
        ledger: Arc<QuotaLedger>,
        provider: Arc<dyn Provider>,
        provider_timeout: Duration,
        order: ResultOrder,
    ) -> Self {
        Self {
            pool,
            ledger,
            provider,
            provider_timeout,
            order,
        }
    }

    /// Resolves every address of `batch` and returns one result per address,
    /// except when the provider throttles the first address, in which case
    /// only that address's result is returned.
    ///
    /// # Behavior
    ///
    /// - An empty batch makes no provider calls.
    /// - An exhausted ledger short-circuits the whole batch with
    ///   [`ResolveError::QuotaExceeded`] items and [`Error::QuotaExhausted`].
    /// - The first address is resolved inline so a provider-side rate limit
    ///   aborts the batch ([`Error::ProviderRateLimited`]) before the pool
    ///   sees any of it.
    /// - Every other address is admitted through the ledger one at a time;
    ///   admitted ones go to the pool, the rest get
    ///   [`ResolveError::QuotaExceeded`] without a provider call.
    /// - Exactly the admitted number of replies is collected. If the pool is
    ///   closed first, the missing addresses get transport errors.
    pub async fn run(&self, batch: Vec<GeocodeRequest>) -> BatchOutcome {
        let size = batch.len();
        if size == 0 {
            tracing::info!("No requests to geocode");
            return BatchOutcome::default();
        }

        increment_batches();
        record_batch_size(size);
        let started = Instant::now();

        let outcome = self.dispatch(batch).await;

        record_batch_duration(started.elapsed());
        if self.ledger.is_enabled() {
            tracing::info!("Remaining quota: {}", self.ledger.remaining());
        }
        outcome
    }

    async fn dispatch(&self, batch: Vec<GeocodeRequest>) -> BatchOutcome {
        let size = batch.len();

        if self.ledger.is_exhausted() {
            tracing::warn!("Quota exhausted, rejecting batch of {size} addresses");
            increment_quota_rejections(size);
            return BatchOutcome {
                results: batch.into_iter().map(quota_rejected).collect(),
                error: Some(Error::QuotaExhausted),
            };
        }

        // (original index, result), in merge order.
        let mut merged: Vec<(usize, GeocodeResult)> = Vec::with_capacity(size);
        let mut items = batch.into_iter().enumerate();

        if let Some((index, first)) = items.next() {
            if self.ledger.try_consume() {
                let result =
                    resolve_with_deadline(self.provider.as_ref(), first, self.provider_timeout)
                        .await;
                if result.error() == Some(&ResolveError::ProviderRateLimited) {
                    tracing::warn!(
                        "Provider rate limit hit on first address, aborting batch of {size}"
                    );
                    increment_batch_aborts();
                    return BatchOutcome {
                        results: vec![result],
                        error: Some(Error::ProviderRateLimited),
                    };
                }
                merged.push((index, result));
            } else {
                increment_quota_rejections(1);
                merged.push((index, quota_rejected(first)));
            }
        }

        let (reply_tx, mut reply_rx) = mpsc::channel(size);
        let mut in_flight: BTreeMap<usize, GeocodeRequest> = BTreeMap::new();
        let mut rejected = 0;

        for (index, request) in items {
            if !self.ledger.try_consume() {
                rejected += 1;
                merged.push((index, quota_rejected(request)));
                continue;
            }

            let pending = request.clone();
            let work = WorkRequest::Resolve {
                index,
                request,
                reply: reply_tx.clone(),
            };
            match self.pool.submit(work).await {
                Ok(()) => {
                    in_flight.insert(index, pending);
                }
                Err(e) => {
                    tracing::warn!("Could not submit address '{}': {e}", pending.address);
                    merged.push((index, GeocodeResult::failed(pending, e.into())));
                }
            }
        }
        // Only the queued requests may keep the reply channel open.
        drop(reply_tx);

        if rejected > 0 {
            tracing::warn!("Quota exceeded for {rejected} of {size} addresses");
            increment_quota_rejections(rejected);
        }

        let admitted = in_flight.len();
        tracing::debug!("Waiting for {admitted} geocoding replies");

        while !in_flight.is_empty() {
            let reply = tokio::select! {
                biased;
                reply = reply_rx.recv() => reply,
                () = self.pool.cancelled() => None,
            };
            let Some(Reply { index, result }) = reply else {
                break;
            };
            if in_flight.remove(&index).is_some() {
                merged.push((index, result));
            } else {
                tracing::error!("Discarding unexpected reply for index {index}");
            }
        }

        if !in_flight.is_empty() {
            tracing::error!(
                "Worker pool stopped with {} of {admitted} addresses unresolved",
                in_flight.len()
            );
            merged.extend(in_flight.into_iter().map(|(index, request)| {
                let error = ResolveError::transport("worker pool closed before reply");
                (index, GeocodeResult::failed(request, error))
            }));
        }

        if self.order == ResultOrder::Input {
            merged.sort_by_key(|(index, _)| *index);
        }

        BatchOutcome {
            results: merged.into_iter().map(|(_, result)| result).collect(),
            error: None,
        }
    }
}

fn quota_rejected(request: GeocodeRequest) -> GeocodeResult {
    GeocodeResult::failed(request, ResolveError::QuotaExceeded)
}
