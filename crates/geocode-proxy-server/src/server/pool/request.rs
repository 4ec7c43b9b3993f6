use geocode_proxy_core::types::{GeocodeRequest, GeocodeResult};
use tokio::sync::{mpsc, oneshot};

/// Messages carried on the pool's shared work queue.
#[derive(Debug)]
pub enum WorkRequest {
    /// Resolve one address and publish the result on the batch's `reply`
    /// channel. `index` is the address's position in its batch and is echoed
    /// back unchanged in the [`Reply`].
    Resolve {
        index: usize,
        request: GeocodeRequest,
        reply: mpsc::Sender<Reply>,
    },
    /// Stop the worker that dequeues this message and acknowledge on
    /// `response`.
    Shutdown { response: oneshot::Sender<()> },
}

/// A worker's answer to a [`WorkRequest::Resolve`].
#[derive(Debug)]
pub struct Reply {
    pub index: usize,
    pub result: GeocodeResult,
}
