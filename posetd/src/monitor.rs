//! Periodic progress logger, adapted from the teacher's `ConsensusMonitor`:
//! instead of block/header processing counters, reports poset growth — units
//! stored, level reached, and linear-order length — once every few seconds
//! so a running node's liveness is visible without `trace`-level logging.

use poset_core::task::service::{AsyncService, AsynServiceFuture};
use poset_core::task::tick::TickService;
use poset_core::{info, trace};
use poset_network::SharedNode;
use std::sync::Arc;
use std::time::Duration;

const IDENT: &str = "poset-monitor";
const REPORT_INTERVAL: Duration = Duration::from_secs(5);

pub struct PosetMonitor {
    node: SharedNode,
    tick: TickService,
}

impl PosetMonitor {
    pub fn new(node: SharedNode) -> Self {
        Self { node, tick: TickService::new() }
    }

    async fn worker(self: &Arc<Self>) {
        let mut last_units = 0usize;
        loop {
            self.tick.tick(REPORT_INTERVAL).await;
            if self.tick.is_shutdown() {
                break;
            }

            let (units, level_reached, ordered, forkers) = {
                let guard = self.node.lock();
                let poset = guard.poset();
                (poset.len(), poset.level_reached(), guard.timing().linear_order().len(), poset.forkers().len())
            };
            if units == last_units {
                continue;
            }
            last_units = units;

            info!("poset | {units} units stored, level_reached={level_reached}, linear_order={ordered}, forkers={forkers}");
        }
        trace!("{IDENT} | exiting");
    }
}

impl AsyncService for PosetMonitor {
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
        self.tick.shutdown();
    }

    fn stop(self: Arc<Self>) -> AsynServiceFuture {
        Box::pin(async move { Ok(()) })
    }
}
