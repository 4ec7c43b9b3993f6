//! Long-lived pool of geocoding workers.
//!
//! This module defines [`WorkerPool`], which owns `N` worker tasks created
//! once at startup and shared by every inbound batch for the lifetime of the
//! process. Workers pull [`WorkRequest`]s from one bounded MPMC queue, so an
//! idle worker always picks up the next address regardless of which batch it
//! belongs to.
//!
//! Responses do not flow back through a pool-wide channel. Each
//! [`WorkRequest::Resolve`] carries the reply sender of the batch that
//! submitted it, which keeps concurrent batches from ever observing each
//! other's results.

use super::{request::WorkRequest, worker::worker_loop};
use core::time::Duration;
use geocode_proxy_core::{Error, provider::Provider};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{sync::oneshot, task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;

/// Sizing and timing knobs for a [`WorkerPool`].
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub num_workers: usize,
    pub queue_capacity: usize,
    pub provider_timeout: Duration,
    pub shutdown_timeout: Duration,
}

/// A fixed set of workers sharing one bounded work queue.
pub struct WorkerPool {
    queue: async_channel::Sender<WorkRequest>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    accepting: AtomicBool,
    shutdown_token: CancellationToken,
    num_workers: usize,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Spawns `config.num_workers` workers on the current Tokio runtime.
    ///
    /// The queue holds at most `config.queue_capacity` pending requests;
    /// submitters wait for space beyond that. Sizing it at least as large as
    /// the biggest accepted batch lets one batch enqueue all of its addresses
    /// without waiting on the workers.
    pub fn spawn(provider: Arc<dyn Provider>, config: &PoolConfig) -> Self {
        let (tx, rx) = async_channel::bounded(config.queue_capacity.max(1));
        let shutdown_token = CancellationToken::new();

        let handles = (0..config.num_workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    rx.clone(),
                    Arc::clone(&provider),
                    config.provider_timeout,
                    shutdown_token.clone(),
                ))
            })
            .collect();

        tracing::debug!(
            "Spawned {} workers with a queue of {}",
            config.num_workers,
            config.queue_capacity
        );

        Self {
            queue: tx,
            handles: Mutex::new(handles),
            accepting: AtomicBool::new(true),
            shutdown_token,
            num_workers: config.num_workers,
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    pub const fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Requests waiting in the queue, not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// `false` once [`shutdown`](Self::shutdown) or [`close`](Self::close)
    /// has begun.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// `true` once the pool has been hard-closed.
    pub fn is_closed(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Resolves when the pool is hard-closed.
    ///
    /// Batches waiting for replies select on this so they never wait on
    /// workers that are gone.
    pub async fn cancelled(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// Enqueues a [`WorkRequest`], waiting for queue space if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pool is shutting down ([`Error::ServiceShutdown`]).
    /// - The queue is closed ([`Error::ChannelError`]).
    pub async fn submit(&self, request: WorkRequest) -> Result<(), Error> {
        if !self.is_accepting() {
            return Err(Error::ServiceShutdown);
        }

        self.queue.send(request).await.map_err(|_| Error::ChannelError {
            context: "Work queue closed".to_string(),
        })
    }

    /// Hard stop: refuses new work, closes the queue and cancels every idle
    /// worker. Requests still sitting in the queue are never processed.
    pub fn close(&self) {
        self.accepting.store(false, Ordering::Release);
        self.shutdown_token.cancel();
        self.queue.close();
    }

    /// Waits up to `within` for every worker task to finish, aborting any
    /// that are still running afterwards. Returns the number of workers that
    /// stopped on their own.
    pub async fn join(&self, within: Duration) -> usize {
        let handles = std::mem::take(&mut *self.handles.lock());
        let mut stopped = 0;

        for (i, handle) in handles.into_iter().enumerate() {
            let abort = handle.abort_handle();
            match timeout(within, handle).await {
                Ok(Ok(())) => stopped += 1,
                Ok(Err(e)) => {
                    tracing::error!("Worker {i} panicked: {e}");
                }
                Err(_) => {
                    tracing::warn!("Worker {i} did not stop in time, aborting");
                    abort.abort();
                }
            }
        }

        stopped
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Stops accepting new submissions.
    /// - Queues one [`WorkRequest::Shutdown`] per worker behind any pending
    ///   work, so addresses already admitted still get resolved.
    /// - Waits (up to `shutdown_timeout` per worker) for acknowledgements.
    /// - Hard-closes the pool and reaps the worker tasks.
    ///
    /// This method is typically invoked during service termination.
    pub async fn shutdown(&self) -> Result<(), Error> {
        // === Phase 0: Stop accepting new requests ===
        tracing::info!("Refusing new geocoding work");
        self.accepting.store(false, Ordering::Release);

        // === Phase 1: Notify workers behind the pending work ===
        tracing::debug!(
            "Notifying {} workers to shut down ({} requests still queued)",
            self.num_workers,
            self.queued()
        );
        let mut acks = Vec::with_capacity(self.num_workers);
        for i in 0..self.num_workers {
            let (tx, rx) = oneshot::channel();
            match timeout(
                self.shutdown_timeout,
                self.queue.send(WorkRequest::Shutdown { response: tx }),
            )
            .await
            {
                Ok(Ok(())) => acks.push((i, rx)),
                Ok(Err(e)) => {
                    tracing::error!("Failed to send shutdown to worker {i}: {e}");
                }
                Err(_) => {
                    tracing::warn!("Timed out queueing shutdown for worker {i}");
                }
            }
        }

        let shutdown_timeout = self.shutdown_timeout;
        let waits = acks.into_iter().map(|(i, rx)| async move {
            match timeout(shutdown_timeout, rx).await {
                Ok(Ok(())) => {
                    tracing::trace!("Worker shutdown acknowledged ({i})");
                }
                Ok(Err(e)) => {
                    tracing::error!("Shutdown acknowledgement {i} dropped: {e}");
                }
                Err(_) => {
                    tracing::warn!("Shutdown acknowledgement {i} timed out");
                }
            }
        });
        futures::future::join_all(waits).await;

        // === Phase 2: Cancel anything left and reap the tasks ===
        self.close();
        let stopped = self.join(self.shutdown_timeout).await;

        tracing::info!(
            "Worker pool shutdown complete ({stopped}/{} workers stopped cleanly)",
            self.num_workers
        );
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
        self.queue.close();
    }
}
