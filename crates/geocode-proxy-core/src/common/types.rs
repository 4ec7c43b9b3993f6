//! # Geocoding Request and Result Types
//!
//! These are the values that travel through the dispatch engine:
//!
//! - [`GeocodeRequest`] - one caller-supplied `(id, address)` pair
//! - [`Location`] - a resolved latitude/longitude
//! - [`GeocodeResult`] - a request paired with its outcome
//!
//! A result holds a `Result<Location, ResolveError>`, so "has coordinates" and
//! "has an error" can never both be true. Zero coordinates only appear once a
//! result is flattened onto the wire, and carry no meaning there.

use crate::error::ResolveError;

/// One address to resolve, as submitted by the caller.
///
/// `id` is opaque and only used for correlation. It does not have to be
/// unique within a batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeocodeRequest {
    pub id: String,
    pub address: String,
}

impl GeocodeRequest {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

/// A point on the globe in decimal degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// The outcome of resolving a single [`GeocodeRequest`].
#[derive(Clone, Debug, PartialEq)]
pub struct GeocodeResult {
    pub request: GeocodeRequest,
    pub outcome: Result<Location, ResolveError>,
}

impl GeocodeResult {
    pub const fn located(request: GeocodeRequest, location: Location) -> Self {
        Self {
            request,
            outcome: Ok(location),
        }
    }

    pub const fn failed(request: GeocodeRequest, error: ResolveError) -> Self {
        Self {
            request,
            outcome: Err(error),
        }
    }

    pub fn id(&self) -> &str {
        &self.request.id
    }

    pub fn address(&self) -> &str {
        &self.request.address
    }

    pub fn location(&self) -> Option<Location> {
        self.outcome.as_ref().ok().copied()
    }

    pub fn error(&self) -> Option<&ResolveError> {
        self.outcome.as_ref().err()
    }

    pub const fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}
