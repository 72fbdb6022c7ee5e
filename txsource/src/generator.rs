//! Synthetic transaction generator: produces batches of random opaque
//! byte-strings from a seeded RNG, matching `original_source`'s
//! `tx_source_gen(batch_size, txpu, seed)` calling contract referenced from
//! `aleph/main.py` (its body was filtered from the retrieval pack; the
//! seeded-batch-producer shape is all the calling convention tells us, and
//! is exactly what a deterministic test load generator needs).

use crate::queue::{channel, TxBatch, TxQueue};
use crate::TxSource;
use log::trace;
use rand::RngCore;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// `batch_size` transactions per push, each `tx_size` bytes, spaced by
/// `interval`. `seed` makes the byte content reproducible across runs for
/// testing.
pub struct GeneratorSource {
    pub batch_size: usize,
    pub tx_size: usize,
    pub seed: u64,
    pub interval: Duration,
    stop: Arc<AtomicBool>,
}

impl GeneratorSource {
    pub fn new(batch_size: usize, tx_size: usize, seed: u64, interval: Duration) -> Self {
        Self { batch_size, tx_size, seed, interval, stop: Arc::new(AtomicBool::new(false)) }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl TxSource for GeneratorSource {
    fn spawn(self: Arc<Self>, _tx_receiver_address: Option<SocketAddr>) -> (TxQueue, JoinHandle<()>) {
        let (sender, receiver) = channel();
        let handle = thread::Builder::new()
            .name("tx-generator".into())
            .spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                while !self.stop.load(Ordering::SeqCst) {
                    let batch: TxBatch = (0..self.batch_size)
                        .map(|_| {
                            let mut tx = vec![0u8; self.tx_size];
                            rng.fill_bytes(&mut tx);
                            tx
                        })
                        .collect();
                    if sender.send(batch).is_err() {
                        trace!("tx-generator: queue consumer dropped, exiting");
                        break;
                    }
                    thread::sleep(self.interval);
                }
            })
            .expect("spawning the tx-generator thread");
        (TxQueue::new(receiver), handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_the_same_first_batch() {
        let a = Arc::new(GeneratorSource::new(4, 8, 42, Duration::from_millis(1)));
        let b = Arc::new(GeneratorSource::new(4, 8, 42, Duration::from_millis(1)));
        let (queue_a, handle_a) = a.clone().spawn(None);
        let (queue_b, handle_b) = b.clone().spawn(None);

        let batch_a = loop {
            if let Some(batch) = queue_a.try_recv() {
                break batch;
            }
        };
        let batch_b = loop {
            if let Some(batch) = queue_b.try_recv() {
                break batch;
            }
        };
        assert_eq!(batch_a, batch_b);

        a.stop();
        b.stop();
        handle_a.join().unwrap();
        handle_b.join().unwrap();
    }
}
