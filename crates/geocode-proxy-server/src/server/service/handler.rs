//! Batch geocoding service.
//!
//! This module defines [`GeocodeService`], the object the HTTP layer talks
//! to. It owns the long-lived pieces shared by every request:
//!
//! - the [`WorkerPool`] spawned once at startup,
//! - the process-wide [`QuotaLedger`] and its reset timer,
//! - the [`BatchCoordinator`] that runs each batch against both.
//!
//! Every failure is reported inside the [`BatchResponse`] body; nothing here
//! produces a transport-level error.

use crate::server::{
    batch::{BatchCoordinator, BatchOutcome},
    config::ServerConfig,
    pool::{WorkerPool, worker::resolve_with_deadline},
    quota::QuotaLedger,
};
use core::time::Duration;
use geocode_proxy_core::{
    Error,
    provider::Provider,
    types::{GeocodeRequest, GeocodeResult},
    wire::{BatchRequest, BatchResponse},
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Snapshot returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub workers: usize,
    pub queued: usize,
    pub quota: QuotaHealth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaHealth {
    pub enabled: bool,
    pub limit: u64,
    pub remaining: u64,
}

/// Cheaply cloneable handle to the shared geocoding machinery.
#[derive(Clone)]
pub struct GeocodeService {
    coordinator: Arc<BatchCoordinator>,
    pool: Arc<WorkerPool>,
    ledger: Arc<QuotaLedger>,
    provider: Arc<dyn Provider>,
    provider_timeout: Duration,
    max_batch_size: usize,
    max_body_bytes: usize,
    shutdown_token: CancellationToken,
    reset_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl GeocodeService {
    /// Spawns the worker pool and, if configured, the quota reset timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &ServerConfig, provider: Arc<dyn Provider>) -> Self {
        let pool = Arc::new(WorkerPool::spawn(
            Arc::clone(&provider),
            &config.pool_config(),
        ));
        let ledger = Arc::new(QuotaLedger::new(config.quota, config.quota_window));
        let shutdown_token = CancellationToken::new();
        let reset_task = ledger.start_auto_reset(shutdown_token.clone());

        let coordinator = BatchCoordinator::new(
            Arc::clone(&pool),
            Arc::clone(&ledger),
            Arc::clone(&provider),
            config.provider_timeout,
            config.result_order,
        );

        Self {
            coordinator: Arc::new(coordinator),
            pool,
            ledger,
            provider,
            provider_timeout: config.provider_timeout,
            max_batch_size: config.max_batch_size,
            max_body_bytes: config.max_body_bytes,
            shutdown_token,
            reset_task: Arc::new(Mutex::new(reset_task)),
        }
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    /// Largest request body the HTTP surface buffers.
    pub const fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Decodes a raw request body, runs the batch and encodes the outcome.
    ///
    /// A malformed body yields a response carrying only the decode error; no
    /// quota is consumed and the provider is never called.
    pub async fn geocode(&self, body: &[u8]) -> BatchResponse {
        let batch = match BatchRequest::decode(body) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!("{e}");
                return BatchResponse::from_error(&e);
            }
        };

        match self.geocode_batch(batch).await {
            Ok(BatchOutcome { results, error }) => BatchResponse::new(results, error.as_ref()),
            Err(e) => {
                tracing::warn!("Batch rejected: {e}");
                BatchResponse::from_error(&e)
            }
        }
    }

    /// Runs an already decoded batch.
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceShutdown`] once shutdown has begun.
    /// - [`Error::InvalidRequest`] when the batch exceeds the configured
    ///   maximum size.
    #[tracing::instrument(skip_all, fields(addresses = batch.len()))]
    pub async fn geocode_batch(&self, batch: Vec<GeocodeRequest>) -> Result<BatchOutcome, Error> {
        if !self.pool.is_accepting() {
            return Err(Error::ServiceShutdown);
        }
        if batch.len() > self.max_batch_size {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "batch of {} addresses exceeds the maximum of {}",
                    batch.len(),
                    self.max_batch_size
                ),
            });
        }

        Ok(self.coordinator.run(batch).await)
    }

    /// Resolves `address` directly, bypassing the pool and the quota.
    ///
    /// Used to check provider connectivity at startup.
    pub async fn probe(&self, address: &str) -> GeocodeResult {
        resolve_with_deadline(
            self.provider.as_ref(),
            GeocodeRequest::new("probe", address),
            self.provider_timeout,
        )
        .await
    }

    pub fn health(&self) -> Health {
        Health {
            status: if self.pool.is_accepting() {
                "serving"
            } else {
                "draining"
            },
            workers: self.pool.num_workers(),
            queued: self.pool.queued(),
            quota: QuotaHealth {
                enabled: self.ledger.is_enabled(),
                limit: self.ledger.limit(),
                remaining: self.ledger.remaining(),
            },
        }
    }

    /// Stops the quota timer and drains the worker pool.
    ///
    /// Addresses already queued are still resolved; new batches are refused
    /// with [`Error::ServiceShutdown`].
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.shutdown_token.cancel();
        let reset_task = self.reset_task.lock().take();
        if let Some(handle) = reset_task {
            if let Err(e) = handle.await {
                tracing::error!("Quota reset task failed: {e}");
            }
        }
        self.pool.shutdown().await
    }
}
