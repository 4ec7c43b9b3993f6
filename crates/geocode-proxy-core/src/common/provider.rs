//! The geocoding capability the proxy fans requests out to.
//!
//! The dispatch engine only ever needs one operation from a backend:
//! resolve one address to one [`Location`]. Everything else (credentials,
//! HTTP client, response decoding) stays inside the implementation.

use crate::{error::ResolveError, types::Location};
use futures::future::BoxFuture;

/// Failure reported by a [`Provider`].
///
/// The three cases are distinguished because the batch coordinator treats
/// them differently: a [`ProviderError::RateLimited`] on the first address of
/// a batch aborts the whole batch, the others are recorded per address.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider found no match for the address.
    #[error("no result found for address")]
    NoResults,

    /// The provider's own rate or quota limit is exceeded.
    #[error("provider rate limit exceeded")]
    RateLimited,

    /// Network, HTTP or decoding failure.
    #[error("provider transport error: {context}")]
    Transport { context: String },
}

impl ProviderError {
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
        }
    }
}

impl From<ProviderError> for ResolveError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NoResults => ResolveError::Unresolved,
            ProviderError::RateLimited => ResolveError::ProviderRateLimited,
            ProviderError::Transport { context } => ResolveError::Transport { context },
        }
    }
}

/// A geocoding backend that resolves one address at a time.
///
/// Implementations are shared by every worker through an `Arc<dyn Provider>`,
/// so they must be cheap to call concurrently. The returned future is boxed
/// to keep the trait object-safe.
pub trait Provider: Send + Sync + 'static {
    /// Resolves `address` to a single location.
    fn resolve<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<Location, ProviderError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_onto_resolve_errors() {
        assert_eq!(
            ResolveError::from(ProviderError::NoResults),
            ResolveError::Unresolved
        );
        assert_eq!(
            ResolveError::from(ProviderError::RateLimited),
            ResolveError::ProviderRateLimited
        );
        assert_eq!(
            ResolveError::from(ProviderError::transport("timed out")),
            ResolveError::transport("timed out")
        );
    }
}
