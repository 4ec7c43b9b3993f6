//! Process-wide admission budget for provider calls.
//!
//! [`QuotaLedger`] counts how many addresses have been admitted to the
//! provider since the last reset and refuses admissions beyond the configured
//! limit. A limit of `0` disables the ledger entirely: every admission
//! succeeds and nothing is counted.
//!
//! The ledger is shared by every batch through an `Arc`. Admission is a
//! single check-and-increment under the write lock, so concurrent batches can
//! never jointly overshoot the limit. Reads used for observability only take
//! the read lock.

use core::time::Duration;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Thread-safe counter of consumed provider calls against a budget.
#[derive(Debug)]
pub struct QuotaLedger {
    limit: u64,
    window: Duration,
    consumed: RwLock<u64>,
}

impl QuotaLedger {
    /// Creates a ledger allowing `limit` admissions per `window`.
    ///
    /// - `limit == 0` disables quota checks.
    /// - `window == Duration::ZERO` disables the periodic reset; the budget is
    ///   then only restored by an explicit [`reset`](Self::reset).
    pub const fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window,
            consumed: RwLock::new(0),
        }
    }

    /// A ledger that admits everything.
    pub const fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub const fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    pub const fn limit(&self) -> u64 {
        self.limit
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Atomically admits one provider call if budget remains.
    ///
    /// Returns `true` and records the admission when the ledger is disabled
    /// or `consumed < limit`. Returns `false` without mutating anything
    /// otherwise.
    pub fn try_consume(&self) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let mut consumed = self.consumed.write();
        if *consumed < self.limit {
            *consumed += 1;
            true
        } else {
            false
        }
    }

    /// Budget left in the current window (`limit - consumed`).
    ///
    /// Always `0` for a disabled ledger; check [`is_enabled`](Self::is_enabled)
    /// to tell "unlimited" from "used up".
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(*self.consumed.read())
    }

    /// Number of admissions recorded since the last reset.
    pub fn consumed(&self) -> u64 {
        *self.consumed.read()
    }

    /// `true` when the ledger is enabled and no budget is left.
    pub fn is_exhausted(&self) -> bool {
        self.is_enabled() && *self.consumed.read() >= self.limit
    }

    /// Restores the full budget.
    pub fn reset(&self) {
        *self.consumed.write() = 0;
    }

    /// Spawns a background task that calls [`reset`](Self::reset) once per
    /// window until `shutdown` is cancelled.
    ///
    /// Returns `None`, spawning nothing, when the ledger is disabled or has no
    /// window. Must be called from within a Tokio runtime.
    pub fn start_auto_reset(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if !self.is_enabled() || self.window.is_zero() {
            return None;
        }

        let ledger = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let window = ledger.window;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + window, window);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        tracing::debug!("Quota auto-reset stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        ledger.reset();
                        tracing::info!(
                            "Reset quota after timeout {:?} to value {}",
                            window,
                            ledger.limit
                        );
                    }
                }
            }
        });

        Some(handle)
    }
}
