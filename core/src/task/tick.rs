use std::{sync::Arc, time::Duration};
use tokio::select;
use triggered::{trigger, Listener, Trigger};

use super::service::{AsyncService, AsynServiceFuture};

const TICK: &str = "tick";

/// A cancellable sleep shared by every cooperative task that paces itself
/// with a delay (the creator loop's `create_delay`, the dispatcher's
/// `SYNC_INIT_DELAY`): `tick` returns either when `duration` elapses or as
/// soon as the process starts shutting down, whichever comes first, so no
/// task ever outlives the shutdown signal by a full sleep interval.
pub struct TickService {
    shutdown_trigger: Trigger,
    shutdown_listener: Listener,
}

impl TickService {
    pub fn new() -> Self {
        let (shutdown, monitor) = trigger();
        Self { shutdown_trigger: shutdown, shutdown_listener: monitor }
    }

    /// Waits until `duration` has elapsed when the service is started.
    ///
    /// Returns immediately when the service is stopped.
    pub async fn tick(&self, duration: Duration) {
        let shutdown_listener = self.shutdown_listener.clone();
        select! {
            biased;
            _ = shutdown_listener => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_listener.is_triggered()
    }

    /// Triggers shutdown directly, for callers that hold a bare
    /// `TickService` rather than an `Arc<TickService>` and so cannot go
    /// through [`AsyncService::signal_exit`].
    pub fn shutdown(&self) {
        self.shutdown_trigger.trigger();
    }
}

impl Default for TickService {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncService for TickService {
    fn ident(self: Arc<Self>) -> &'static str {
        TICK
    }

    fn start(self: Arc<Self>) -> AsynServiceFuture {
        Box::pin(async move { Ok(()) })
    }

    fn signal_exit(self: Arc<Self>) {
        self.shutdown_trigger.trigger();
    }

    fn stop(self: Arc<Self>) -> AsynServiceFuture {
        Box::pin(async move { Ok(()) })
    }
}
