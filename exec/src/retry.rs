//! Wraps any `RemoteExecutor` so connection-level failures retry through
//! the shared backoff kernel (§4.6).

use async_trait::async_trait;
use fleetwright_common::wait::{retry, RetryConfig};
use tokio_util::sync::CancellationToken;

use crate::error::ExecError;
use crate::{CommandOutput, RemoteExecutor, Target};

pub struct RetryingExecutor<T> {
    inner: T,
    cfg: RetryConfig,
    cancel: CancellationToken,
}

impl<T: RemoteExecutor> RetryingExecutor<T> {
    pub fn new(inner: T, cfg: RetryConfig, cancel: CancellationToken) -> Self {
        Self { inner, cfg, cancel }
    }
}

#[async_trait]
impl<T: RemoteExecutor> RemoteExecutor for RetryingExecutor<T> {
    async fn execute(&self, target: &Target, script: &str) -> Result<CommandOutput, ExecError> {
        fleetwright_common::metrics::retry_attempted("remote_exec");
        retry(&self.cancel, &self.cfg, ExecError::is_retryable, || {
            self.inner.execute(target, script)
        })
        .await
        .map_err(|e| match e {
            fleetwright_common::error::CommonError::Cancelled { last: Some(inner) } => {
                ExecError::Transport(format!("cancelled: {inner}"))
            }
            fleetwright_common::error::CommonError::Cancelled { last: None } => {
                ExecError::Transport("cancelled".to_string())
            }
            fleetwright_common::error::CommonError::Exhausted(inner) => inner,
        })
    }
}
