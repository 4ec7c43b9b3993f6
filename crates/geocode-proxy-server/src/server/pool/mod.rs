//! Dispatch engine: a fixed set of workers resolving addresses in parallel.

pub mod manager;
pub mod request;
pub mod worker;

pub use manager::{PoolConfig, WorkerPool};
pub use request::{Reply, WorkRequest};
