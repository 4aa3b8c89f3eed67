//! Etcd snapshot and restore (§4.5). Snapshots use RKE2's built-in
//! `etcd-snapshot` subcommand against a timestamp-named file; restore stops
//! the service, resets the cluster to the chosen snapshot, and restarts —
//! the operator must then restart every other master by hand.

use chrono::Utc;
use fleetwright_exec::{RemoteExecutor, Target};

use crate::error::BootstrapError;

const SNAPSHOT_DIR: &str = "/var/lib/rancher/rke2/server/db/snapshots";

pub fn snapshot_name(cluster_name: &str, now: chrono::DateTime<Utc>) -> String {
    format!("{cluster_name}-{}", now.format("%Y%m%d%H%M%S"))
}

pub async fn take_snapshot(
    executor: &dyn RemoteExecutor,
    target: &Target,
    cluster_name: &str,
    now: chrono::DateTime<Utc>,
) -> Result<String, BootstrapError> {
    let name = snapshot_name(cluster_name, now);
    let script = format!("rke2 etcd-snapshot save --name {name}");
    let out = executor
        .execute(target, &script)
        .await
        .map_err(|e| BootstrapError::Remote(e.to_string()))?;
    if !out.success() {
        return Err(BootstrapError::Remote(out.stderr));
    }
    Ok(format!("{SNAPSHOT_DIR}/{name}"))
}

/// Stops the server, runs `cluster-reset` against `snapshot_path`, and
/// restarts. Returns the operator-facing instruction (§4.5: "instructs the
/// operator to restart every other master").
pub async fn restore_snapshot(
    executor: &dyn RemoteExecutor,
    target: &Target,
    snapshot_path: &str,
    other_masters: &[String],
) -> Result<String, BootstrapError> {
    let script = format!(
        "systemctl stop rke2-server\n\
         rke2 server --cluster-reset --cluster-reset-restore-path={snapshot_path}\n\
         systemctl start rke2-server\n"
    );
    let out = executor
        .execute(target, &script)
        .await
        .map_err(|e| BootstrapError::Remote(e.to_string()))?;
    if !out.success() {
        return Err(BootstrapError::Remote(out.stderr));
    }
    if other_masters.is_empty() {
        Ok("restore complete; no other masters to restart".to_string())
    } else {
        Ok(format!(
            "restore complete; restart rke2-server on the remaining masters by hand: {}",
            other_masters.join(", ")
        ))
    }
}
