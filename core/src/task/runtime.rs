use crate::core::Core;
use crate::service::Service;
use crate::task::service::{AsyncService, AsyncServiceResult};
use crate::{info, signals::Shutdown, trace, warn};
use futures_util::future::{select_all, try_join_all};
use std::{
    sync::{Arc, Mutex},
    thread::{self, JoinHandle as ThreadJoinHandle},
};
use tokio::task::JoinHandle as TaskJoinHandle;

const ASYNC_RUNTIME: &str = "async-runtime";

/// Registers async services and drives them on a dedicated tokio runtime.
///
/// A poset node runs exactly three async services under here: the unit
/// creator loop, the sync dispatcher, and the listener pool (see
/// `poset-creator` and `poset-network`).
pub struct AsyncRuntime {
    threads: usize,
    services: Mutex<Vec<Arc<dyn AsyncService>>>,
}

impl Default for AsyncRuntime {
    fn default() -> Self {
        Self::new(std::cmp::max(num_cpus::get() / 3, 2))
    }
}

impl AsyncRuntime {
    pub fn new(threads: usize) -> Self {
        trace!("Creating the async-runtime service");
        Self { threads, services: Mutex::new(Vec::new()) }
    }

    pub fn register<T>(&self, service: Arc<T>)
    where
        T: AsyncService,
    {
        self.services.lock().unwrap().push(service);
    }

    pub fn init(self: Arc<AsyncRuntime>, core: Arc<Core>) -> Vec<ThreadJoinHandle<()>> {
        trace!("initializing async-runtime service");
        vec![thread::Builder::new().name(ASYNC_RUNTIME.to_string()).spawn(move || self.worker(core)).unwrap()]
    }

    /// Launch a tokio Runtime and run the top-level async objects
    pub fn worker(self: &Arc<AsyncRuntime>, core: Arc<Core>) {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.threads)
            .enable_all()
            .build()
            .expect("Failed building the Runtime")
            .block_on(async { self.worker_impl(core).await });
    }

    pub async fn worker_impl(self: &Arc<AsyncRuntime>, core: Arc<Core>) {
        // Start all async services. All services futures are spawned as tokio
        // tasks to enable parallelism
        trace!("async-runtime worker starting");
        let futures = self
            .services
            .lock()
            .unwrap()
            .iter()
            .map(|x| tokio::spawn(x.clone().start()))
            .collect::<Vec<TaskJoinHandle<AsyncServiceResult<()>>>>();

        // wait for at least one service to return
        let (result, _idx, remaining_futures) = select_all(futures).await;
        // Any top-level service completing, successfully or not, ends the run: a
        // poset node's creator loop returns `Ok(())` on its own once it reaches
        // `level_limit`/`units_limit` (§5), and that is as much a reason for the
        // dispatcher and listener pool to wind down as a hard service error is.
        match result {
            Ok(Err(_)) | Err(_) => trace!("shutting down core due to async-runtime error"),
            Ok(Ok(())) => trace!("shutting down core: a service completed"),
        }
        core.shutdown();

        // wait for remaining services to finish
        try_join_all(remaining_futures).await.unwrap();

        // Stop all async services
        trace!("async-runtime worker stopping");
        for x in self.services.lock().unwrap().iter() {
            let service_name = x.clone().ident();
            match futures::executor::block_on(x.clone().stop()) {
                Ok(_) => {
                    info!("[{0}] stopped successfully", service_name);
                }
                Err(err) => {
                    warn!("[{0}] failed stopping operation with error: {1} - signaling exit to force closure", service_name, err);
                }
            }
        }

        trace!("async-runtime worker exiting");
    }

    pub fn signal_exit(self: Arc<AsyncRuntime>) {
        trace!("Sending an exit signal to all async-runtime services");
        for service in self.services.lock().unwrap().iter() {
            service.clone().signal_exit();
        }
    }
}

impl Service for AsyncRuntime {
    fn ident(self: Arc<AsyncRuntime>) -> &'static str {
        ASYNC_RUNTIME
    }

    fn start(self: Arc<AsyncRuntime>, core: Arc<Core>) -> Vec<ThreadJoinHandle<()>> {
        self.init(core)
    }

    fn stop(self: Arc<AsyncRuntime>) {
        self.signal_exit()
    }
}
