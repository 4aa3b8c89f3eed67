//! Peer-reachability gate (§4.4): after a node's interface is brought up,
//! poll until it can reach at least one peer's overlay IP, bounded by a
//! ~20s window at 1s cadence.

use std::time::Duration;

use fleetwright_exec::{RemoteExecutor, Target};
use tokio_util::sync::CancellationToken;

use crate::error::MeshError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pings every peer overlay IP from `target` until one answers or the
/// window elapses. A node that cannot establish at least one peer within
/// the window is reported so its downstream bootstrap vertex can be
/// skipped (§4.4 failure semantics).
pub async fn wait_for_peer_reachability(
    executor: &dyn RemoteExecutor,
    target: &Target,
    node_name: &str,
    peer_overlay_ips: &[String],
    cancel: &CancellationToken,
) -> Result<(), MeshError> {
    wait_for_peer_reachability_with(executor, target, node_name, peer_overlay_ips, cancel, DEFAULT_TIMEOUT, POLL_INTERVAL).await
}

pub async fn wait_for_peer_reachability_with(
    executor: &dyn RemoteExecutor,
    target: &Target,
    node_name: &str,
    peer_overlay_ips: &[String],
    cancel: &CancellationToken,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), MeshError> {
    if peer_overlay_ips.is_empty() {
        return Err(MeshError::Unreachable(node_name.to_string()));
    }

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        for ip in peer_overlay_ips {
            let script = format!("ping -c 1 -W 1 {ip}");
            if let Ok(out) = executor.execute(target, &script).await {
                if out.success() {
                    return Ok(());
                }
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(MeshError::Unreachable(node_name.to_string()));
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(MeshError::Unreachable(node_name.to_string())),
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}
