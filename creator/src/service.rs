//! The creator loop as a cooperative task (§4.6, §5): repeatedly select
//! parents, legalize (sign, then pass the unit through the very compliance
//! checks a received unit would face), insert, and sleep an adaptively
//! paced delay, until `level_limit` or `units_limit` is reached.

use crate::pacing::AdaptiveDelay;
use crate::parent_selection::select_parents;
use parking_lot::Mutex;
use poset_core::task::service::{AsyncService, AsynServiceFuture};
use poset_core::task::tick::TickService;
use poset_core::{info, trace, warn};
use poset_crypto::{CoinShare, SecretKey};
use poset_dag::AddOutcome;
use poset_ordering::OrderedPoset;
use poset_txsource::TxQueue;
use poset_unit::{CreatorId, Unit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type SharedNode = Arc<Mutex<OrderedPoset>>;

const IDENT: &str = "creator";

pub struct CreatorConfig {
    pub creator: CreatorId,
    pub n_parents: usize,
    pub level_limit: u64,
    pub units_limit: u64,
    pub step_size: f64,
    pub adaptive_delay: bool,
    pub create_delay: Duration,
}

/// Builds the next unit this process would create: the dealing unit if none
/// exists yet, otherwise a parent-selected, self-legalized unit carrying
/// `transactions` and (when the prospective level requires it) a freshly
/// generated coin share.
fn build_unit(node: &OrderedPoset, config: &CreatorConfig, secret_key: &SecretKey, transactions: Vec<Vec<u8>>) -> Option<Unit> {
    let poset = node.poset();
    if poset.maximal_units_per_process(config.creator).is_empty() {
        return Some(Unit::dealing(config.creator, secret_key));
    }

    let parents = select_parents(poset, config.creator, config.n_parents)?;
    let draft = Unit::sign(config.creator, parents.clone(), transactions.clone(), None, secret_key);
    let prepared = poset.prepare(&draft);

    if poset.use_tcoin_required(prepared.level, prepared.is_prime) {
        let coin_share = CoinShare::generate(secret_key, prepared.level);
        Some(Unit::sign(config.creator, parents, transactions, Some(coin_share), secret_key))
    } else {
        Some(draft)
    }
}

pub struct CreatorService {
    config: CreatorConfig,
    secret_key: SecretKey,
    node: SharedNode,
    tx_queue: TxQueue,
    tick: TickService,
    created_count: AtomicU64,
}

impl CreatorService {
    pub fn new(config: CreatorConfig, secret_key: SecretKey, node: SharedNode, tx_queue: TxQueue) -> Self {
        Self { config, secret_key, node, tx_queue, tick: TickService::new(), created_count: AtomicU64::new(0) }
    }

    pub fn created_count(&self) -> u64 {
        self.created_count.load(Ordering::SeqCst)
    }

    async fn worker(self: Arc<Self>) {
        let mut pacing = AdaptiveDelay::new(self.config.create_delay, self.config.step_size);
        let mut pending_txs = Vec::new();

        loop {
            if self.tick.is_shutdown() {
                break;
            }
            if self.config.units_limit != 0 && self.created_count.load(Ordering::SeqCst) >= self.config.units_limit {
                info!("creator {} | created {} units, stopping", self.config.creator, self.config.units_limit);
                break;
            }

            let txs = std::mem::take(&mut pending_txs);
            let candidate = {
                let guard = self.node.lock();
                build_unit(&guard, &self.config, &self.secret_key, txs)
            };

            match candidate {
                Some(unit) => {
                    let level = {
                        let mut guard = self.node.lock();
                        match guard.add_unit(unit.clone()) {
                            Ok(Some((AddOutcome::Inserted(_), _))) => Some(guard.poset().get(&unit.hash()).map(|u| u.level).unwrap_or(0)),
                            Ok(_) => {
                                warn!("creator {} | self-created unit was already present, skipping", self.config.creator);
                                None
                            }
                            Err(err) => {
                                // §7 `InternalInvariantError`: a unit we built ourselves can
                                // only fail the same compliance check a received unit would
                                // face if our own view of the poset is already inconsistent
                                // with §3's invariants. That should be impossible; treat it as
                                // fatal rather than silently skipping the tick.
                                poset_core::error!(
                                    "creator {} | self-created unit failed its own compliance check: {err} — poset invariants are broken, exiting",
                                    self.config.creator
                                );
                                std::process::exit(1);
                            }
                        }
                    };

                    if let Some(level) = level {
                        self.created_count.fetch_add(1, Ordering::SeqCst);
                        trace!("creator {} | created unit {} at level {}", self.config.creator, unit.short_name(), level);
                        if self.config.adaptive_delay {
                            pacing.record(level);
                        }
                        if self.config.level_limit != 0 && level >= self.config.level_limit {
                            info!("creator {} | reached level {}, stopping", self.config.creator, self.config.level_limit);
                            break;
                        }
                    }
                }
                None => trace!("creator {} | no compliant parent set available this tick", self.config.creator),
            }

            if let Some(batch) = self.tx_queue.try_recv() {
                pending_txs = batch;
            }

            self.tick.tick(pacing.delay()).await;
        }
    }
}

impl AsyncService for CreatorService {
    fn ident(self: Arc<Self>) -> &'static str {
        IDENT
    }

    fn start(self: Arc<Self>) -> AsynServiceFuture {
        Box::pin(async move {
            self.worker().await;
            Ok(())
        })
    }

    fn signal_exit(self: Arc<Self>) {
        trace!("sending an exit signal to {}", IDENT);
        self.tick.shutdown();
    }

    fn stop(self: Arc<Self>) -> AsynServiceFuture {
        Box::pin(async move {
            trace!("{} stopped", IDENT);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poset_crypto::FixedCommitteeCoin;
    use poset_ordering::OrderingConfig;
    use std::str::FromStr;

    fn secret_key(byte: u8) -> SecretKey {
        SecretKey::from_str(&hex::encode([byte; 32])).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stops_after_units_limit_and_produces_a_dealing_unit_first() {
        let keys: Vec<_> = (0..4).map(secret_key).collect();
        let public_keys: Vec<_> = keys.iter().map(|k| k.public_key()).collect();
        let node: SharedNode = Arc::new(Mutex::new(OrderedPoset::new(
            public_keys,
            false,
            0,
            OrderingConfig::default(),
            Box::new(FixedCommitteeCoin),
        )));

        let config = CreatorConfig {
            creator: 0,
            n_parents: 4,
            level_limit: 0,
            units_limit: 1,
            step_size: 0.1,
            adaptive_delay: true,
            create_delay: Duration::from_millis(1),
        };
        let service = Arc::new(CreatorService::new(config, keys[0].clone(), node.clone(), TxQueue::empty()));

        service.clone().start().await.unwrap();

        assert_eq!(service.created_count(), 1);
        assert_eq!(node.lock().poset().level_reached(), 0);
        assert!(node.lock().poset().maximal_units_per_process(0).len() == 1);
    }
}
