//! Transaction source (§4.9, out of scope as a collaborator per §1 but
//! concretely plumbed here): a `TxSource` capability producing batches of
//! opaque transaction bytes on a dedicated OS thread, handed to the creator
//! through a bounded queue of capacity 1000 (§5). Two built-ins: a synthetic
//! generator seeded by `rand_chacha`, and a TCP listener.

mod generator;
mod listener;
mod queue;

pub use generator::GeneratorSource;
pub use listener::ListenerSource;
pub use queue::{TxBatch, TxQueue, QUEUE_CAPACITY};

use std::net::SocketAddr;
use std::thread::JoinHandle;

/// A capability that produces transaction batches on its own thread and
/// feeds them into a bounded queue, isolating a blocking or crashing
/// producer from the consensus loop. `tx_receiver_address` is only
/// meaningful to [`ListenerSource`]; [`GeneratorSource`] ignores it.
pub trait TxSource: Send + Sync + 'static {
    fn spawn(self: std::sync::Arc<Self>, tx_receiver_address: Option<SocketAddr>) -> (TxQueue, JoinHandle<()>);
}
