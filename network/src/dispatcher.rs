//! Outbound side of the gossip engine (§4.7, §5): on every tick, picks a
//! peer and dials it for one initiator-side sync. Honors `syncs_limit` and
//! stops dispatching new syncs as soon as shutdown is signalled, though the
//! in-flight sync (if any) is allowed to finish before the service returns.

use crate::peer_selection::PeerSelector;
use crate::sync::{run_initiator, SyncError};
use crate::SharedNode;
use poset_config::GossipStrategy;
use poset_core::task::service::{AsyncService, AsynServiceFuture};
use poset_core::task::tick::TickService;
use poset_core::{info, trace, warn};
use parking_lot::Mutex;
use poset_unit::CreatorId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

const IDENT: &str = "gossip-dispatcher";

pub struct DispatcherConfig {
    pub self_id: CreatorId,
    /// Hosts indexed by process id, as assembled by `Committee::bootstrap`.
    pub hosts: Vec<String>,
    pub gossip_port: u16,
    pub strategy: GossipStrategy,
    pub sync_init_delay: Duration,
    /// Stop dispatching once this many syncs have been started; 0 disables.
    pub syncs_limit: u64,
}

pub struct SyncDispatcher {
    config: DispatcherConfig,
    node: SharedNode,
    tick: TickService,
    selector: Mutex<PeerSelector>,
    dispatched: AtomicU64,
}

impl SyncDispatcher {
    pub fn new(config: DispatcherConfig, node: SharedNode) -> Self {
        let n_processes = config.hosts.len();
        let selector = Mutex::new(PeerSelector::new(config.strategy, n_processes, config.self_id));
        Self { config, node, tick: TickService::new(), selector, dispatched: AtomicU64::new(0) }
    }

    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    async fn worker(self: Arc<Self>) {
        // Not cryptographic: peer selection only needs to be unpredictable
        // enough to spread syncs, not secret.
        let mut rng = StdRng::from_entropy();

        loop {
            if self.tick.is_shutdown() {
                break;
            }
            let dispatch_id = self.dispatched.load(Ordering::SeqCst);
            if self.config.syncs_limit != 0 && dispatch_id >= self.config.syncs_limit {
                info!("{IDENT} | reached syncs_limit {}, stopping", self.config.syncs_limit);
                break;
            }

            let peer = { self.selector.lock().choose(dispatch_id, &mut rng) };
            if let Some(peer) = peer {
                self.dispatched.fetch_add(1, Ordering::SeqCst);
                match self.sync_with(peer).await {
                    Ok(outcome) => {
                        trace!("{IDENT} | synced with process {peer}: received {} sent {}", outcome.units_received, outcome.units_sent);
                        self.selector.lock().record_sync(peer, dispatch_id);
                    }
                    Err(err) => warn!("{IDENT} | sync with process {peer} failed: {err}"),
                }
            } else {
                trace!("{IDENT} | no eligible peer this tick");
            }

            self.tick.tick(self.config.sync_init_delay).await;
        }
    }

    async fn sync_with(&self, peer: CreatorId) -> Result<crate::sync::SyncOutcome, SyncError> {
        let host = self.config.hosts.get(peer as usize).ok_or_else(|| {
            SyncError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, format!("no configured host for process {peer}")))
        })?;
        let addr = poset_config::parse_socket_addr(host, self.config.gossip_port)
            .map_err(|err| SyncError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, err)))?;
        let mut stream = TcpStream::connect(addr).await?;
        run_initiator(&mut stream, &self.node).await
    }
}

impl AsyncService for SyncDispatcher {
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
        trace!("sending an exit signal to {IDENT}");
        self.tick.shutdown();
    }

    fn stop(self: Arc<Self>) -> AsynServiceFuture {
        Box::pin(async move {
            trace!("{IDENT} stopped");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ListenerPool;
    use poset_crypto::{FixedCommitteeCoin, SecretKey};
    use poset_ordering::{OrderedPoset, OrderingConfig};
    use poset_unit::Unit;
    use std::str::FromStr;
    use tokio::net::TcpListener;

    fn committee(n: u16) -> Vec<SecretKey> {
        (0..n).map(|i| SecretKey::from_str(&hex::encode([i as u8; 32])).unwrap()).collect()
    }

    fn node(keys: &[SecretKey]) -> SharedNode {
        let public_keys = keys.iter().map(|k| k.public_key()).collect::<Vec<_>>();
        Arc::new(Mutex::new(OrderedPoset::new(public_keys, false, 0, OrderingConfig::default(), Box::new(FixedCommitteeCoin))))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dispatcher_syncs_with_its_only_peer_and_honors_syncs_limit() {
        let keys = committee(2);
        let server_node = node(&keys);
        server_node.lock().add_unit(Unit::dealing(1, &keys[1])).unwrap();

        let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bound_addr = reserved.local_addr().unwrap();
        drop(reserved);
        let pool = Arc::new(ListenerPool::new(server_node.clone(), bound_addr));
        let listener_handle = tokio::spawn(pool.clone().start());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let client_node = node(&keys);
        let dispatcher = Arc::new(SyncDispatcher::new(
            DispatcherConfig {
                self_id: 0,
                hosts: vec![bound_addr.ip().to_string(), bound_addr.ip().to_string()],
                gossip_port: bound_addr.port(),
                strategy: GossipStrategy::UniformRandom,
                sync_init_delay: Duration::from_millis(5),
                syncs_limit: 1,
            },
            client_node.clone(),
        ));

        dispatcher.clone().start().await.unwrap();

        assert_eq!(dispatcher.dispatched_count(), 1);
        assert!(client_node.lock().poset().contains(&Unit::dealing(1, &keys[1]).hash()));

        pool.signal_exit();
        listener_handle.abort();
    }
}
