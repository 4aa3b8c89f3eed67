//! The upgrade protocol (§4.5): masters then workers, one at a time.
//! Workers are cordoned and drained before the service is stopped; masters
//! skip that step since draining the control plane isn't meaningful here.

use std::time::Duration;

use fleetwright_exec::{RemoteExecutor, Target};
use tokio_util::sync::CancellationToken;

use crate::config::readiness_script;
use crate::error::BootstrapError;
use crate::poll::poll_until_ready;

const UPGRADE_READY_BUDGET: Duration = Duration::from_secs(30);
const UPGRADE_READY_INTERVAL: Duration = Duration::from_secs(2);

fn reinstall_script(service: &str, install_type: &str, version: &str) -> String {
    format!(
        "systemctl stop {service}\n\
         curl -sfL https://get.rke2.io | INSTALL_RKE2_VERSION={version} INSTALL_RKE2_TYPE={install_type} sh -\n\
         systemctl start {service}\n"
    )
}

/// Upgrades one master in place: stop, reinstall, start, wait active.
/// No cordon/drain — masters don't host general workloads.
pub async fn upgrade_master(
    executor: &dyn RemoteExecutor,
    target: &Target,
    node_name: &str,
    version: &str,
    cancel: &CancellationToken,
) -> Result<(), BootstrapError> {
    let script = reinstall_script("rke2-server", "server", version);
    executor
        .execute(target, &script)
        .await
        .map_err(|e| BootstrapError::Remote(e.to_string()))?;
    poll_until_ready(
        executor,
        target,
        node_name,
        &readiness_script("rke2-server"),
        "rke2-server",
        UPGRADE_READY_BUDGET,
        UPGRADE_READY_INTERVAL,
        cancel,
    )
    .await
}

/// Upgrades one worker: cordon and drain via `control_target` (a node with
/// `kubectl` access), stop/reinstall/start/wait on the worker itself, then
/// uncordon.
pub async fn upgrade_worker(
    executor: &dyn RemoteExecutor,
    control_target: &Target,
    worker_target: &Target,
    node_name: &str,
    version: &str,
    cancel: &CancellationToken,
) -> Result<(), BootstrapError> {
    executor
        .execute(control_target, &format!("kubectl cordon {node_name}"))
        .await
        .map_err(|e| BootstrapError::Remote(e.to_string()))?;
    executor
        .execute(
            control_target,
            &format!("kubectl drain {node_name} --ignore-daemonsets --delete-emptydir-data --force"),
        )
        .await
        .map_err(|e| BootstrapError::Remote(e.to_string()))?;

    let script = reinstall_script("rke2-agent", "agent", version);
    executor
        .execute(worker_target, &script)
        .await
        .map_err(|e| BootstrapError::Remote(e.to_string()))?;
    poll_until_ready(
        executor,
        worker_target,
        node_name,
        &readiness_script("rke2-agent"),
        "rke2-agent",
        UPGRADE_READY_BUDGET,
        UPGRADE_READY_INTERVAL,
        cancel,
    )
    .await?;

    executor
        .execute(control_target, &format!("kubectl uncordon {node_name}"))
        .await
        .map_err(|e| BootstrapError::Remote(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwright_exec::FakeExecutor;

    #[tokio::test]
    async fn worker_upgrade_cordons_drains_and_uncordons_in_order() {
        let executor = FakeExecutor::always_ok();
        let control = Target::new("10.8.0.10", "root", "id_rsa");
        let worker = Target::new("10.8.0.20", "root", "id_rsa");
        upgrade_worker(&executor, &control, &worker, "workers-0", "v1.31.0+rke2r1", &CancellationToken::new())
            .await
            .unwrap();

        let calls = executor.calls();
        let cordon = calls.iter().position(|(_, s)| s.contains("cordon workers-0")).unwrap();
        let drain = calls.iter().position(|(_, s)| s.contains("drain workers-0")).unwrap();
        let uncordon = calls.iter().position(|(_, s)| s.contains("uncordon workers-0")).unwrap();
        assert!(cordon < drain);
        assert!(drain < uncordon);
    }

    #[tokio::test]
    async fn master_upgrade_never_drains() {
        let executor = FakeExecutor::always_ok();
        let target = Target::new("10.8.0.10", "root", "id_rsa");
        upgrade_master(&executor, &target, "masters-0", "v1.31.0+rke2r1", &CancellationToken::new())
            .await
            .unwrap();
        assert!(executor.calls().iter().all(|(_, s)| !s.contains("drain")));
    }
}
