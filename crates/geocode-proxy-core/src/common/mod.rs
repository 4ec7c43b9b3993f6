//! Types shared between the proxy's dispatch engine and its HTTP surface.
//!
//! - [`types`] - Requests, locations and per-address results.
//! - [`error`] - Per-address [`ResolveError`] and batch-level [`Error`].
//! - [`provider`] - The [`Provider`] capability every geocoding backend
//!   implements.
//! - [`wire`] - JSON request/response bodies of the `/geocode` endpoint.
//!
//! [`ResolveError`]: error::ResolveError
//! [`Provider`]: provider::Provider

pub mod error;
pub mod provider;
pub mod types;
pub mod wire;

pub use error::{Error, ResolveError, Result};
