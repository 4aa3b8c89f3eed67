//! Cancellation-aware readiness polling shared by every bootstrap phase
//! (§4.5's per-phase budgets: 180s/5s for the first master, 30s/2s for
//! joining masters and workers).

use std::time::Duration;

use fleetwright_exec::{RemoteExecutor, Target};
use tokio_util::sync::CancellationToken;

use crate::config::recent_log_script;
use crate::error::BootstrapError;

/// Polls `check_script` against `target` until it succeeds or `budget`
/// elapses. On timeout, fetches `service`'s recent logs so the caller can
/// surface them in the `Failed` transition (§4.5 step 1).
pub async fn poll_until_ready(
    executor: &dyn RemoteExecutor,
    target: &Target,
    node: &str,
    check_script: &str,
    service: &str,
    budget: Duration,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<(), BootstrapError> {
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        if cancel.is_cancelled() {
            return Err(BootstrapError::Cancelled);
        }
        match executor.execute(target, check_script).await {
            Ok(out) if out.success() => return Ok(()),
            _ => {}
        }
        if tokio::time::Instant::now() >= deadline {
            let last_log = executor
                .execute(target, &recent_log_script(service))
                .await
                .map(|out| out.stdout)
                .unwrap_or_default();
            return Err(BootstrapError::Timeout {
                node: node.to_string(),
                budget_secs: budget.as_secs(),
                last_log,
            });
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(BootstrapError::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
