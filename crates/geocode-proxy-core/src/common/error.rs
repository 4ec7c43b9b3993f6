//! Error types for the geocoding proxy.
//!
//! Two layers of failure exist and the wire format reports them in different
//! places:
//!
//! - [`ResolveError`] is attached to a single address. It never aborts a
//!   batch; the item simply carries the error instead of coordinates.
//! - [`Error`] describes the batch or the service as a whole (malformed body,
//!   oversized batch, provider throttling detected on the first address,
//!   exhausted quota, shutdown).
//!
//! The `Display` output of both enums is what callers see in the `error`
//! fields of the JSON response. The short upper-case codes are the ones
//! existing clients already match on and must not change.

/// Convenience alias used throughout the proxy.
pub type Result<T> = core::result::Result<T, Error>;

/// Why a single address has no coordinates.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// The provider answered but found nothing for the address.
    #[error("UNABLE_TO_GEOCODE")]
    Unresolved,

    /// The provider itself reported that its rate or quota limit is hit.
    #[error("GOOGLE_OVER_QUERY_LIMIT")]
    ProviderRateLimited,

    /// This process's own budget was exhausted; the provider was not called.
    #[error("SERVER_QUERY_LIMIT")]
    QuotaExceeded,

    /// Network, decoding, deadline or pool failure.
    #[error("{context}")]
    Transport { context: String },
}

impl ResolveError {
    /// Shorthand for building a [`ResolveError::Transport`].
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
        }
    }
}

/// Batch- and service-level failures.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The inbound body could not be decoded into a batch.
    #[error("Error decoding request body, {reason}")]
    RequestDecode { reason: String },

    /// The batch decoded fine but violates a server limit.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The provider throttled the first address, so the rest of the batch was
    /// never sent.
    #[error("GOOGLE_OVER_QUERY_LIMIT")]
    ProviderRateLimited,

    /// The internal quota was already used up when the batch arrived.
    #[error("SERVER_QUERY_LIMIT")]
    QuotaExhausted,

    /// Internal queue send/receive failure (e.g. the work queue is closed).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for ResolveError {
    /// Lowers a service-level failure onto the single address it prevented
    /// from being resolved.
    fn from(err: Error) -> Self {
        match err {
            Error::ProviderRateLimited => ResolveError::ProviderRateLimited,
            Error::QuotaExhausted => ResolveError::QuotaExceeded,
            other => ResolveError::transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_codes_are_stable() {
        assert_eq!(ResolveError::Unresolved.to_string(), "UNABLE_TO_GEOCODE");
        assert_eq!(
            ResolveError::ProviderRateLimited.to_string(),
            "GOOGLE_OVER_QUERY_LIMIT"
        );
        assert_eq!(ResolveError::QuotaExceeded.to_string(), "SERVER_QUERY_LIMIT");
        assert_eq!(Error::QuotaExhausted.to_string(), "SERVER_QUERY_LIMIT");
        assert_eq!(
            Error::ProviderRateLimited.to_string(),
            "GOOGLE_OVER_QUERY_LIMIT"
        );
    }

    #[test]
    fn transport_error_displays_its_context() {
        let err = ResolveError::transport("connection reset");
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn service_errors_lower_onto_items() {
        assert_eq!(
            ResolveError::from(Error::ServiceShutdown),
            ResolveError::transport("Service is shutting down")
        );
        assert_eq!(
            ResolveError::from(Error::QuotaExhausted),
            ResolveError::QuotaExceeded
        );
    }
}
