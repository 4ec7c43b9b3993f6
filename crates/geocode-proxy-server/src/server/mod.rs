pub mod batch;
pub mod config;
pub mod http;
pub mod pool;
pub mod provider;
pub mod quota;
pub mod service;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;
