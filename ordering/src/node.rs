//! Combines a [`Poset`] with a [`TimingEngine`] behind one type so every
//! unit insertion, local or received over gossip, keeps both in lock step
//! (§5: a single lock guards this pair in a running node).

use crate::election::{OrderingConfig, TimingEngine};
use crate::OrderingOutcome;
use poset_crypto::{CommonCoin, Crp, PublicKey};
use poset_dag::{AddOutcome, Poset, PosetError};
use poset_unit::Unit;

/// Owns the DAG index and the ordering engine together, and a boxed common
/// coin (`Send + Sync` so the pair can live behind an `Arc<Mutex<_>>` shared
/// by the creator and network services).
pub struct OrderedPoset {
    poset: Poset,
    timing: TimingEngine,
    coin: Box<dyn CommonCoin + Send + Sync>,
}

impl OrderedPoset {
    pub fn new(
        public_keys: Vec<PublicKey>,
        use_tcoin: bool,
        threshold_start_level: u64,
        ordering_config: OrderingConfig,
        coin: Box<dyn CommonCoin + Send + Sync>,
    ) -> Self {
        let crp = Crp::new(public_keys.clone());
        let poset = Poset::new(public_keys, use_tcoin, threshold_start_level);
        let timing = TimingEngine::new(ordering_config, crp);
        Self { poset, timing, coin }
    }

    pub fn poset(&self) -> &Poset {
        &self.poset
    }

    pub fn timing(&self) -> &TimingEngine {
        &self.timing
    }

    /// Validates and inserts `unit`, then drives the ordering engine
    /// forward with whatever the insertion unlocked. Returns `Ok(None)` for
    /// an already-known unit (no ordering work to do).
    pub fn add_unit(&mut self, unit: Unit) -> Result<Option<(AddOutcome, OrderingOutcome)>, PosetError> {
        let outcome = self.poset.add(unit)?;
        match outcome {
            AddOutcome::AlreadyPresent => Ok(None),
            AddOutcome::Inserted(_) => {
                let ordering_outcome = self.timing.on_unit_added(&self.poset, self.coin.as_ref());
                Ok(Some((outcome, ordering_outcome)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poset_crypto::{FixedCommitteeCoin, SecretKey};
    use std::str::FromStr;

    fn committee(n: u16) -> Vec<SecretKey> {
        (0..n).map(|i| SecretKey::from_str(&hex::encode([i as u8; 32])).unwrap()).collect()
    }

    #[test]
    fn adding_the_same_unit_twice_only_extends_ordering_once() {
        let keys = committee(4);
        let public_keys: Vec<_> = keys.iter().map(|k| k.public_key()).collect();
        let mut node = OrderedPoset::new(
            public_keys,
            false,
            0,
            OrderingConfig { voting_start_level: 1, ..Default::default() },
            Box::new(FixedCommitteeCoin),
        );

        let dealing = Unit::dealing(0, &keys[0]);
        let id = dealing.hash();
        let first = node.add_unit(dealing.clone()).unwrap();
        assert!(matches!(first, Some((AddOutcome::Inserted(inserted), _)) if inserted == id));

        let second = node.add_unit(dealing).unwrap();
        assert!(second.is_none());
    }
}
