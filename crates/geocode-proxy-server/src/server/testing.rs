//! In-memory [`Provider`] used by the unit tests.

use core::time::Duration;
use futures::future::BoxFuture;
use geocode_proxy_core::{
    provider::{Provider, ProviderError},
    types::Location,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DENVER: Location = Location::new(39.7392, -104.9903);

#[derive(Clone)]
enum Script {
    Respond(Result<Location, ProviderError>),
    Delay(Duration, Result<Location, ProviderError>),
    Stall,
}

/// Answers per address from a script and counts every call.
pub struct ScriptedProvider {
    scripts: HashMap<String, Script>,
    fallback: Script,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// Resolves every unscripted address to [`DENVER`].
    pub fn succeeding() -> Self {
        Self {
            scripts: HashMap::new(),
            fallback: Script::Respond(Ok(DENVER)),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(mut self, address: &str, outcome: Result<Location, ProviderError>) -> Self {
        self.scripts
            .insert(address.to_string(), Script::Respond(outcome));
        self
    }

    pub fn delay(mut self, address: &str, delay: Duration) -> Self {
        self.scripts
            .insert(address.to_string(), Script::Delay(delay, Ok(DENVER)));
        self
    }

    /// Never answers for `address`.
    pub fn stall(mut self, address: &str) -> Self {
        self.scripts.insert(address.to_string(), Script::Stall);
        self
    }

    /// Applies `delay` to every unscripted address.
    pub fn delay_all(mut self, delay: Duration) -> Self {
        self.fallback = Script::Delay(delay, Ok(DENVER));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl Provider for ScriptedProvider {
    fn resolve<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<Location, ProviderError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(address.to_string());

            let script = self
                .scripts
                .get(address)
                .cloned()
                .unwrap_or_else(|| self.fallback.clone());

            match script {
                Script::Respond(outcome) => outcome,
                Script::Delay(delay, outcome) => {
                    tokio::time::sleep(delay).await;
                    outcome
                }
                Script::Stall => futures::future::pending().await,
            }
        })
    }
}
