//! Inbound side of the gossip engine (§4.7, §5): one task accepts TCP
//! connections on the configured gossip port, and one task per accepted
//! connection runs the responder half of the sync protocol. Per §5, no
//! peer is allowed more than one in-flight inbound sync; a second
//! connection from an IP we are already syncing with is dropped immediately.

use crate::sync::run_responder;
use crate::SharedNode;
use poset_core::task::service::{AsyncService, AsynServiceFuture};
use poset_core::task::tick::TickService;
use poset_core::{info, trace, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

const IDENT: &str = "gossip-listener";

/// `select!` polls `accept()` against this long sleep so the accept loop
/// still reacts to shutdown promptly without busy-polling in between.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_secs(3600);

pub struct ListenerPool {
    node: SharedNode,
    bind_addr: SocketAddr,
    tick: TickService,
    in_flight: Mutex<HashSet<IpAddr>>,
}

impl ListenerPool {
    pub fn new(node: SharedNode, bind_addr: SocketAddr) -> Self {
        Self { node, bind_addr, tick: TickService::new(), in_flight: Mutex::new(HashSet::new()) }
    }

    async fn worker(self: Arc<Self>) {
        let listener = match TcpListener::bind(self.bind_addr).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!("{IDENT} | failed to bind {}: {err}", self.bind_addr);
                return;
            }
        };
        info!("{IDENT} | listening on {}", self.bind_addr);

        loop {
            tokio::select! {
                biased;
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.clone().handle_inbound(stream, addr),
                        Err(err) => warn!("{IDENT} | accept failed: {err}"),
                    }
                }
                _ = self.tick.tick(ACCEPT_POLL_INTERVAL) => {
                    if self.tick.is_shutdown() {
                        break;
                    }
                }
            }
        }
        trace!("{IDENT} | accept loop stopped");
    }

    fn handle_inbound(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let ip = addr.ip();
        if !self.in_flight.lock().insert(ip) {
            trace!("{IDENT} | dropping concurrent inbound sync from {ip}");
            return;
        }

        tokio::spawn(async move {
            let mut stream = stream;
            match run_responder(&mut stream, &self.node).await {
                Ok(outcome) => trace!("{IDENT} | synced with {addr}: received {} sent {}", outcome.units_received, outcome.units_sent),
                Err(err) => warn!("{IDENT} | sync with {addr} aborted: {err}"),
            }
            self.in_flight.lock().remove(&ip);
        });
    }
}

impl AsyncService for ListenerPool {
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
    use poset_crypto::{FixedCommitteeCoin, SecretKey};
    use poset_ordering::{OrderedPoset, OrderingConfig};
    use poset_unit::Unit;
    use std::str::FromStr;
    use tokio::io::AsyncWriteExt;

    fn committee(n: u16) -> Vec<SecretKey> {
        (0..n).map(|i| SecretKey::from_str(&hex::encode([i as u8; 32])).unwrap()).collect()
    }

    fn node(keys: &[SecretKey]) -> SharedNode {
        let public_keys = keys.iter().map(|k| k.public_key()).collect::<Vec<_>>();
        Arc::new(Mutex::new(OrderedPoset::new(public_keys, false, 0, OrderingConfig::default(), Box::new(FixedCommitteeCoin))))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn accepts_a_connection_and_runs_the_responder_side() {
        let keys = committee(2);
        let server_node = node(&keys);
        server_node.lock().add_unit(Unit::dealing(0, &keys[0])).unwrap();

        let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bound_addr = reserved.local_addr().unwrap();
        drop(reserved);
        let pool = Arc::new(ListenerPool::new(server_node.clone(), bound_addr));
        let handle = tokio::spawn(pool.clone().start());

        // Give the accept loop a moment to bind before dialing it.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut client = TcpStream::connect(bound_addr).await.unwrap();
        let client_node = node(&keys);
        let outcome = crate::sync::run_initiator(&mut client, &client_node).await.unwrap();
        assert_eq!(outcome.units_received, 1);

        client.shutdown().await.ok();
        pool.signal_exit();
        handle.abort();
    }
}
