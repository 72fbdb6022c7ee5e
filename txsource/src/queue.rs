use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

pub type Tx = Vec<u8>;
pub type TxBatch = Vec<Tx>;

/// Matches §5's "bounded queue (size 1000) whose `get` suspends when empty":
/// a blocking MPSC channel, since the producer runs on its own OS thread and
/// a full queue should simply block it rather than drop transactions.
pub const QUEUE_CAPACITY: usize = 1000;

pub(crate) fn channel() -> (SyncSender<TxBatch>, Receiver<TxBatch>) {
    sync_channel(QUEUE_CAPACITY)
}

/// The consumer half, held by the creator loop. `try_recv` never blocks the
/// async executor; the creator simply uses whatever is ready this tick.
pub struct TxQueue {
    receiver: Receiver<TxBatch>,
}

impl TxQueue {
    pub(crate) fn new(receiver: Receiver<TxBatch>) -> Self {
        Self { receiver }
    }

    /// A queue with no producer, for callers (tests, a node started without
    /// a configured transaction source) that just want `try_recv` to report
    /// "nothing pending" forever.
    pub fn empty() -> Self {
        let (_, receiver) = channel();
        Self { receiver }
    }

    /// Returns the next ready batch, or `None` if the queue is currently
    /// empty (the creator then proceeds with no transactions this tick,
    /// matching `self.prepared_txs = []` in `original_source/aleph/process.py`).
    pub fn try_recv(&self) -> Option<TxBatch> {
        self.receiver.try_recv().ok()
    }
}
