//! Geocoding service shared by every inbound HTTP call.
//!
//! ## Structure
//!
//! - [`handler`] - [`GeocodeService`](handler::GeocodeService), which owns the
//!   worker pool, the quota ledger and the batch coordinator.

pub mod handler;

pub use handler::{GeocodeService, Health, QuotaHealth};
