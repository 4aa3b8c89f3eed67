//! The orchestrator that drives a cluster through every state in §4.5.

use std::time::Duration;

use fleetwright_common::EventEmitter;
use fleetwright_exec::{RemoteExecutor, Target};
use fleetwright_types::{Event, NodeOutput};
use tokio_util::sync::CancellationToken;

use crate::config::{
    agent_install_script, readiness_script, server_install_script, token_read_script, AgentConfig,
    ServerConfig,
};
use crate::election::elect_first_master;
use crate::error::BootstrapError;
use crate::poll::poll_until_ready;
use crate::state::ClusterBootstrapState;

const FIRST_MASTER_READY_BUDGET: Duration = Duration::from_secs(180);
const FIRST_MASTER_READY_INTERVAL: Duration = Duration::from_secs(5);
const JOIN_READY_BUDGET: Duration = Duration::from_secs(30);
const JOIN_READY_INTERVAL: Duration = Duration::from_secs(2);
const RKE2_SERVER_PORT: u16 = 9345;

#[derive(Clone, Debug)]
pub struct BootstrapSettings {
    pub version: String,
    pub cni: String,
    pub disabled_components: Vec<String>,
    pub secrets_encryption: bool,
    pub snapshot_schedule: Option<String>,
    pub token: String,
    pub ssh_key_path: String,
}

#[derive(Clone, Debug)]
pub struct BootstrapOutcome {
    pub state: ClusterBootstrapState,
    pub first_master: String,
    pub join_token: String,
    /// The kubeconfig with the API server URL rewritten to the first
    /// master's overlay IP, for in-mesh tooling (§4.5 step 5).
    pub kubeconfig: Option<String>,
}

fn target_for(node: &NodeOutput, ssh_key_path: &str) -> Result<Target, BootstrapError> {
    let overlay_ip = node
        .overlay_ip
        .clone()
        .ok_or_else(|| BootstrapError::MissingOverlayIp(node.name.clone()))?;
    Ok(Target::new(overlay_ip, node.ssh_user.clone(), ssh_key_path.to_string()))
}

pub struct ClusterBootstrapper<'a> {
    executor: &'a dyn RemoteExecutor,
    cancel: CancellationToken,
    events: Option<&'a EventEmitter>,
}

impl<'a> ClusterBootstrapper<'a> {
    pub fn new(
        executor: &'a dyn RemoteExecutor,
        cancel: CancellationToken,
        events: Option<&'a EventEmitter>,
    ) -> Self {
        Self { executor, cancel, events }
    }

    /// Publishes a `bootstrap_state_changed` transition. `state` names the
    /// phase being entered (e.g. `first_master_installing`); `node` is the
    /// node the transition pertains to, or `"*"` for fleet-wide steps.
    fn emit(&self, state: &str, node: &str) {
        if let Some(events) = self.events {
            events.emit(
                Event::new("bootstrap_state_changed", "bootstrap")
                    .with("state", state.to_string())
                    .with("node", node.to_string()),
            );
        }
    }

    fn emit_failed(&self, error: &BootstrapError) {
        if let Some(events) = self.events {
            events.emit(Event::new("bootstrap_failed", "bootstrap").with("error", error.to_string()));
        }
    }

    /// Drives the cluster from `Uninitialized` to `ClusterReady`, or returns
    /// the terminal error of whichever phase failed. Re-running against a
    /// cluster whose masters resolve to the same first-master election is
    /// safe; callers that persist `BootstrapOutcome` can skip phases whose
    /// state has already been reached (the idempotent install scripts make
    /// re-running any individual phase a no-op regardless).
    pub async fn run(
        &self,
        masters: &[NodeOutput],
        workers: &[NodeOutput],
        settings: &BootstrapSettings,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        let result = self.run_inner(masters, workers, settings).await;
        if let Err(e) = &result {
            self.emit_failed(e);
        }
        result
    }

    async fn run_inner(
        &self,
        masters: &[NodeOutput],
        workers: &[NodeOutput],
        settings: &BootstrapSettings,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        let master_specs: Vec<fleetwright_types::NodeSpec> = masters
            .iter()
            .map(|m| fleetwright_types::NodeSpec {
                name: m.name.clone(),
                pool: String::new(),
                provider: m.provider,
                size: m.size.clone(),
                region: m.region.clone(),
                image: String::new(),
                roles: vec![fleetwright_types::NodeRole::Master],
                labels: m.labels.clone(),
                taints: vec![],
                spot: false,
                zone: None,
            })
            .collect();
        let first_master_name = elect_first_master(&master_specs)?;
        let first_master = masters
            .iter()
            .find(|m| m.name == first_master_name)
            .expect("election picks a name present in masters");

        self.emit("first_master_installing", &first_master_name);
        let join_token = self.init_first_master(first_master, settings).await?;
        self.emit("token_fetched", &first_master_name);

        let others: Vec<&NodeOutput> = masters.iter().filter(|m| m.name != first_master_name).collect();
        if !others.is_empty() {
            self.emit("additional_masters_joining", "*");
            self.join_additional_masters(first_master, &others, &join_token, settings)
                .await?;
        }

        self.emit("workers_joining", "*");
        self.join_workers(first_master, workers, &join_token, settings).await?;

        self.emit("cluster_ready", &first_master_name);
        let kubeconfig = self.export_kubeconfig(first_master, settings).await.ok();

        Ok(BootstrapOutcome {
            state: ClusterBootstrapState::ClusterReady,
            first_master: first_master_name,
            join_token,
            kubeconfig,
        })
    }

    async fn init_first_master(
        &self,
        first_master: &NodeOutput,
        settings: &BootstrapSettings,
    ) -> Result<String, BootstrapError> {
        let target = target_for(first_master, &settings.ssh_key_path)?;
        let overlay_ip = first_master.overlay_ip.clone().expect("checked by target_for");

        let cfg = ServerConfig {
            node_ip: overlay_ip.clone(),
            node_external_ip: first_master.public_ip.clone(),
            advertise_address: overlay_ip.clone(),
            tls_san: vec![first_master.public_ip.clone(), overlay_ip.clone()],
            token: settings.token.clone(),
            cni: settings.cni.clone(),
            disabled_components: settings.disabled_components.clone(),
            secrets_encryption: settings.secrets_encryption,
            snapshot_schedule: settings.snapshot_schedule.clone(),
            server_url: None,
        };
        let script = server_install_script(&cfg.to_yaml(), &settings.version);
        self.executor
            .execute(&target, &script)
            .await
            .map_err(|e| BootstrapError::Remote(e.to_string()))?;

        poll_until_ready(
            self.executor,
            &target,
            &first_master.name,
            &readiness_script("rke2-server"),
            "rke2-server",
            FIRST_MASTER_READY_BUDGET,
            FIRST_MASTER_READY_INTERVAL,
            &self.cancel,
        )
        .await?;

        let out = self
            .executor
            .execute(&target, &token_read_script())
            .await
            .map_err(|e| BootstrapError::Remote(e.to_string()))?;
        Ok(out.stdout.trim().to_string())
    }

    async fn join_additional_masters(
        &self,
        first_master: &NodeOutput,
        masters: &[&NodeOutput],
        token: &str,
        settings: &BootstrapSettings,
    ) -> Result<(), BootstrapError> {
        let server_url = format!(
            "https://{}:{RKE2_SERVER_PORT}",
            first_master.overlay_ip.clone().expect("checked by init_first_master")
        );

        let joins = masters.iter().map(|master| {
            let server_url = server_url.clone();
            async move {
                let target = target_for(master, &settings.ssh_key_path)?;
                let overlay_ip = master.overlay_ip.clone().expect("checked by target_for");
                let cfg = ServerConfig {
                    node_ip: overlay_ip.clone(),
                    node_external_ip: master.public_ip.clone(),
                    advertise_address: overlay_ip.clone(),
                    tls_san: vec![master.public_ip.clone(), overlay_ip.clone()],
                    token: token.to_string(),
                    cni: settings.cni.clone(),
                    disabled_components: settings.disabled_components.clone(),
                    secrets_encryption: settings.secrets_encryption,
                    snapshot_schedule: settings.snapshot_schedule.clone(),
                    server_url: Some(server_url),
                };
                let script = server_install_script(&cfg.to_yaml(), &settings.version);
                self.executor
                    .execute(&target, &script)
                    .await
                    .map_err(|e| BootstrapError::Remote(e.to_string()))?;
                poll_until_ready(
                    self.executor,
                    &target,
                    &master.name,
                    &readiness_script("rke2-server"),
                    "rke2-server",
                    JOIN_READY_BUDGET,
                    JOIN_READY_INTERVAL,
                    &self.cancel,
                )
                .await
            }
        });

        let results = futures::future::join_all(joins).await;
        results.into_iter().collect::<Result<Vec<()>, BootstrapError>>()?;
        Ok(())
    }

    async fn join_workers(
        &self,
        first_master: &NodeOutput,
        workers: &[NodeOutput],
        token: &str,
        settings: &BootstrapSettings,
    ) -> Result<(), BootstrapError> {
        let server_url = format!(
            "https://{}:{RKE2_SERVER_PORT}",
            first_master.overlay_ip.clone().expect("checked by init_first_master")
        );

        let joins = workers.iter().map(|worker| {
            let server_url = server_url.clone();
            async move {
                let target = target_for(worker, &settings.ssh_key_path)?;
                let overlay_ip = worker.overlay_ip.clone().expect("checked by target_for");
                let cfg = AgentConfig {
                    node_ip: overlay_ip,
                    server_url,
                    token: token.to_string(),
                };
                let script = agent_install_script(&cfg.to_yaml(), &settings.version);
                self.executor
                    .execute(&target, &script)
                    .await
                    .map_err(|e| BootstrapError::Remote(e.to_string()))?;
                poll_until_ready(
                    self.executor,
                    &target,
                    &worker.name,
                    &readiness_script("rke2-agent"),
                    "rke2-agent",
                    JOIN_READY_BUDGET,
                    JOIN_READY_INTERVAL,
                    &self.cancel,
                )
                .await
            }
        });

        let results = futures::future::join_all(joins).await;
        results.into_iter().collect::<Result<Vec<()>, BootstrapError>>()?;
        Ok(())
    }

    async fn export_kubeconfig(
        &self,
        first_master: &NodeOutput,
        settings: &BootstrapSettings,
    ) -> Result<String, BootstrapError> {
        let target = target_for(first_master, &settings.ssh_key_path)?;
        let out = self
            .executor
            .execute(&target, "cat /etc/rancher/rke2/rke2.yaml")
            .await
            .map_err(|e| BootstrapError::Remote(e.to_string()))?;
        let overlay_ip = first_master.overlay_ip.clone().expect("checked by target_for");
        Ok(rewrite_kubeconfig_server(&out.stdout, &overlay_ip))
    }
}

/// Rewrites a kubeconfig's API server URL from `127.0.0.1` to the first
/// master's overlay IP, so tooling running elsewhere in the mesh can reach
/// the API (§4.5 step 5).
pub fn rewrite_kubeconfig_server(kubeconfig: &str, overlay_ip: &str) -> String {
    kubeconfig.replace("127.0.0.1", overlay_ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwright_exec::{CommandOutput, FakeExecutor};
    use fleetwright_types::{CloudProvider, NodeStatus};
    use std::collections::HashMap;

    fn node(name: &str, overlay: &str, public: &str) -> NodeOutput {
        NodeOutput {
            name: name.to_string(),
            provider: CloudProvider::DigitalOcean,
            region: "nyc3".to_string(),
            size: "s-2vcpu-4gb".to_string(),
            public_ip: public.to_string(),
            private_ip: None,
            overlay_ip: Some(overlay.to_string()),
            ssh_user: "root".to_string(),
            labels: HashMap::new(),
            status: NodeStatus::Running,
        }
    }

    fn settings() -> BootstrapSettings {
        BootstrapSettings {
            version: "v1.30.0+rke2r1".to_string(),
            cni: "canal".to_string(),
            disabled_components: vec![],
            secrets_encryption: true,
            snapshot_schedule: None,
            token: "shared-token".to_string(),
            ssh_key_path: "id_rsa".to_string(),
        }
    }

    #[tokio::test]
    async fn scenario_three_bootstrap_order_joins_after_token_fetch() {
        let executor = FakeExecutor::new(Box::new(|_, script| {
            if script.contains("node-token") {
                Ok(CommandOutput {
                    stdout: "shared-secret-token".to_string(),
                    stderr: String::new(),
                    exit_code: 0,
                })
            } else {
                Ok(CommandOutput::default())
            }
        }));
        let masters = vec![node("m3", "10.8.0.12", "203.0.113.12"), node("m1", "10.8.0.10", "203.0.113.10"), node("m2", "10.8.0.11", "203.0.113.11")];
        let workers = vec![node("w1", "10.8.0.20", "203.0.113.20"), node("w2", "10.8.0.21", "203.0.113.21")];

        let bootstrapper = ClusterBootstrapper::new(&executor, CancellationToken::new(), None);
        let outcome = bootstrapper.run(&masters, &workers, &settings()).await.unwrap();

        assert_eq!(outcome.first_master, "m1");
        assert_eq!(outcome.join_token, "shared-secret-token");
        assert_eq!(outcome.state, ClusterBootstrapState::ClusterReady);

        let calls = executor.calls();
        let token_fetch_idx = calls.iter().position(|(_, s)| s.contains("node-token")).unwrap();
        let worker_install_idx = calls
            .iter()
            .position(|(host, s)| host == "10.8.0.20" && s.contains("INSTALL_RKE2_TYPE=agent"))
            .unwrap();
        assert!(token_fetch_idx < worker_install_idx, "no worker joins before token fetch");
    }

    #[tokio::test]
    async fn missing_overlay_ip_is_reported_not_panicked() {
        let executor = FakeExecutor::always_ok();
        let mut m1 = node("m1", "10.8.0.10", "203.0.113.10");
        m1.overlay_ip = None;
        let bootstrapper = ClusterBootstrapper::new(&executor, CancellationToken::new(), None);
        let err = bootstrapper.run(&[m1], &[], &settings()).await.unwrap_err();
        assert!(matches!(err, BootstrapError::MissingOverlayIp(_)));
    }
}
