//! Process driver (§6.1, §9): parses CLI flags, bootstraps the committee and
//! run configuration, wires the creator/dispatcher/listener/monitor services
//! onto `poset-core`'s cooperative runtime, runs until a shutdown signal or
//! `level_limit`/`units_limit` is reached, writes the optional debug dump,
//! and exits with the code prescribed by §6.

mod args;
mod dump;
mod monitor;
mod version;

use args::Args;
use parking_lot::Mutex;
use poset_config::{Committee, RunConfig, TxSourceKind};
use poset_core::core::Core;
use poset_core::signals::Signals;
use poset_core::task::runtime::AsyncRuntime;
use poset_core::{error, info};
use poset_creator::{CreatorConfig, CreatorService};
use poset_crypto::FixedCommitteeCoin;
use poset_network::{DispatcherConfig, ListenerPool, SharedNode, SyncDispatcher};
use poset_ordering::{OrderedPoset, OrderingConfig};
use poset_txsource::{GeneratorSource, ListenerSource, TxQueue, TxSource};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// §6: 0 on reaching `LEVEL_LIMIT`/`UNITS_LIMIT`, nonzero on unrecoverable
/// I/O or crypto failure.
const EXIT_OK: u8 = 0;
const EXIT_FAILURE: u8 = 1;

fn main() -> ExitCode {
    let args = Args::parse();
    poset_core::log::init_logger(args.log_dir.as_deref(), &args.log_level);
    poset_core::panic::configure_panic();

    info!("posetd v{} starting", version::version());

    let committee = match Committee::bootstrap(Path::new(&args.signing_keys), Path::new(&args.ip_addresses), Path::new(&args.my_ip)) {
        Ok(committee) => committee,
        Err(err) => {
            error!("failed to bootstrap the committee: {err}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let run_config = match &args.config {
        Some(path) => match RunConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(err) => {
                error!("failed to load run config at {path}: {err}");
                return ExitCode::from(EXIT_FAILURE);
            }
        },
        None => RunConfig::default(),
    };

    info!(
        "process id {} of {} committee members, listening on {}:{}",
        committee.process_id,
        committee.n_processes(),
        committee.hosts[committee.process_id as usize],
        run_config.gossip_port
    );

    run(committee, run_config, args.dump_path.map(PathBuf::from))
}

fn run(committee: Committee, run_config: RunConfig, dump_path_override: Option<PathBuf>) -> ExitCode {
    let n_processes = committee.n_processes();
    let ordering_config = OrderingConfig {
        voting_start_level: run_config.voting_start_level,
        coin_start_delta: run_config.coin_start_delta,
        precompute_popularity: run_config.precompute_popularity,
    };
    let node: SharedNode = Arc::new(Mutex::new(OrderedPoset::new(
        committee.public_keys.clone(),
        run_config.use_tcoin,
        run_config.threshold_start_level,
        ordering_config,
        Box::new(FixedCommitteeCoin),
    )));

    let tx_queue = spawn_tx_source(&run_config);

    let core = Arc::new(Core::new());
    let signals = Arc::new(Signals::new(core.clone()));
    signals.init();

    let async_runtime = Arc::new(AsyncRuntime::default());

    let creator_config = CreatorConfig {
        creator: committee.process_id,
        n_parents: run_config.resolved_n_parents(n_processes),
        level_limit: run_config.level_limit,
        units_limit: run_config.units_limit,
        step_size: run_config.step_size,
        adaptive_delay: run_config.adaptive_delay,
        create_delay: run_config.create_delay(),
    };
    async_runtime.register(Arc::new(CreatorService::new(creator_config, committee.secret_key.clone(), node.clone(), tx_queue)));

    let dispatcher_config = DispatcherConfig {
        self_id: committee.process_id,
        hosts: committee.hosts.clone(),
        gossip_port: run_config.gossip_port,
        strategy: run_config.gossip_strategy,
        sync_init_delay: run_config.sync_init_delay(),
        syncs_limit: run_config.syncs_limit,
    };
    async_runtime.register(Arc::new(SyncDispatcher::new(dispatcher_config, node.clone())));

    let bind_addr = match poset_config::parse_socket_addr("0.0.0.0", run_config.gossip_port) {
        Ok(addr) => addr,
        Err(err) => {
            error!("failed to parse gossip bind address: {err}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    async_runtime.register(Arc::new(ListenerPool::new(node.clone(), bind_addr)));
    async_runtime.register(Arc::new(monitor::PosetMonitor::new(node.clone())));

    core.bind(async_runtime);
    core.run();

    let level_reached = node.lock().poset().level_reached();
    let units_created = node.lock().poset().len() as u64;
    let reached_limit = (run_config.level_limit != 0 && level_reached >= run_config.level_limit)
        || (run_config.units_limit != 0 && units_created >= run_config.units_limit);

    let dump_target = dump_path_override.or_else(|| run_config.dump_path.map(PathBuf::from));
    if let Some(path) = dump_target {
        match dump::write_dump(&node, &path) {
            Ok(()) => info!("wrote debug dump to {}", path.display()),
            Err(err) => error!("failed to write debug dump to {}: {err}", path.display()),
        }
    }

    info!("posetd stopped: {} units, level_reached={level_reached}", node.lock().poset().len());
    if reached_limit || (run_config.level_limit == 0 && run_config.units_limit == 0) {
        ExitCode::from(EXIT_OK)
    } else {
        ExitCode::from(EXIT_FAILURE)
    }
}

/// Builds the configured [`TxSource`] and spawns it, or returns an empty
/// queue if none is configured to run (§9 Open Question: the generator is
/// the only exercised default path; `ListenerSource` needs a real address).
fn spawn_tx_source(run_config: &RunConfig) -> TxQueue {
    match &run_config.tx_source {
        TxSourceKind::Generator { batch_size, txpu, seed } => {
            // `txpu` doubles here as the per-transaction byte size: the
            // original's `tx_source_gen(batch_size, txpu, seed)` contract
            // gives no separate size parameter, so this is the most direct
            // reading that still consumes every field of the configuration.
            let source = Arc::new(GeneratorSource::new(*batch_size, (*txpu).max(1), *seed, run_config.create_delay()));
            let (queue, _handle) = source.spawn(None);
            queue
        }
        TxSourceKind::Listener { address } => {
            let socket_addr = address.as_ref().and_then(|a| a.parse().ok());
            let source = Arc::new(ListenerSource);
            let (queue, _handle) = source.spawn(socket_addr);
            queue
        }
    }
}
