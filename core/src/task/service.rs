use futures_util::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AsyncServiceError {
    #[error("service exited with an error: {0}")]
    Service(String),
}

pub type AsyncServiceResult<T> = Result<T, AsyncServiceError>;
pub type AsynServiceFuture = BoxFuture<'static, AsyncServiceResult<()>>;

/// An async, tokio-driven service bound into an [`crate::task::runtime::AsyncRuntime`].
pub trait AsyncService: Send + Sync + 'static {
    fn ident(self: Arc<Self>) -> &'static str;
    fn start(self: Arc<Self>) -> AsynServiceFuture;
    fn signal_exit(self: Arc<Self>);
    fn stop(self: Arc<Self>) -> AsynServiceFuture;
}
