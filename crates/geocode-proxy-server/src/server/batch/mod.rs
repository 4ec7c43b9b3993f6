//! Per-request batch logic: quota admission, fan-out to the shared worker
//! pool, fan-in of exactly the admitted replies, and the final merge.

pub mod coordinator;

pub use coordinator::{BatchCoordinator, BatchOutcome, ResultOrder};
