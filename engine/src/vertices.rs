//! Concrete `VertexWork` implementations (§4.3/§6) wiring the provider,
//! mesh, bootstrap and addon phases into the resource graph. Every vertex
//! captures the static shape it needs (specs, settings) at construction
//! time, since the manifest is fully known before the graph is built; only
//! provider-observed facts flow through `ctx.outputs`.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use fleetwright_bootstrap::{BootstrapOutcome, BootstrapSettings, ClusterBootstrapper};
use fleetwright_exec::{RemoteExecutor, Target};
use fleetwright_graph::{GraphContext, GraphError, VertexWork};
use fleetwright_mesh::{build_mesh_plan, generate_keypair, wait_for_peer_reachability, Keypair};
use fleetwright_provider::{FirewallOutput, FirewallRule, NetworkOutput, NetworkSpec, Provider};
use fleetwright_types::{Event, NodeOutput, NodeSpec};

/// The firewall rule battery every cluster gets (§6): SSH, the Kubernetes
/// API, etcd and kubelet/scheduler/controller restricted to the overlay
/// subnet, the VPN port itself, the NodePort range, and ICMP.
pub fn default_firewall_rules(overlay_cidr: &str) -> Vec<FirewallRule> {
    let anywhere = vec!["0.0.0.0/0".to_string()];
    let overlay_only = vec![overlay_cidr.to_string()];
    vec![
        FirewallRule {
            protocol: "tcp".to_string(),
            port_range: "22".to_string(),
            source_cidrs: anywhere.clone(),
            description: "SSH".to_string(),
        },
        FirewallRule {
            protocol: "tcp".to_string(),
            port_range: "6443".to_string(),
            source_cidrs: anywhere.clone(),
            description: "Kubernetes API".to_string(),
        },
        FirewallRule {
            protocol: "tcp".to_string(),
            port_range: "2379-2380".to_string(),
            source_cidrs: overlay_only.clone(),
            description: "etcd peer/client".to_string(),
        },
        FirewallRule {
            protocol: "tcp".to_string(),
            port_range: "10250-10252".to_string(),
            source_cidrs: overlay_only.clone(),
            description: "kubelet/scheduler/controller-manager".to_string(),
        },
        FirewallRule {
            protocol: "udp".to_string(),
            port_range: "51820".to_string(),
            source_cidrs: anywhere.clone(),
            description: "VPN mesh".to_string(),
        },
        FirewallRule {
            protocol: "tcp".to_string(),
            port_range: "30000-32767".to_string(),
            source_cidrs: anywhere.clone(),
            description: "NodePort range".to_string(),
        },
        FirewallRule {
            protocol: "icmp".to_string(),
            port_range: "*".to_string(),
            source_cidrs: anywhere,
            description: "ICMP".to_string(),
        },
    ]
}

/// Creates (or, idempotently, re-fetches) one provider's network.
pub struct NetworkVertex {
    pub id: String,
    pub provider: Arc<dyn Provider>,
    pub spec: NetworkSpec,
}

#[async_trait]
impl VertexWork for NetworkVertex {
    async fn apply(&self, ctx: &GraphContext) -> Result<(), GraphError> {
        let output: NetworkOutput = self
            .provider
            .create_network(&self.spec)
            .await
            .map_err(|e| GraphError::VertexFailed(self.id.clone(), e.to_string()))?;
        ctx.events
            .emit(Event::new("network_ready", "engine").with("network", self.id.clone()));
        ctx.outputs.publish(&self.id, output);
        Ok(())
    }
}

/// Creates one node. Depends on its pool's network vertex.
pub struct NodeVertex {
    pub id: String,
    pub provider: Arc<dyn Provider>,
    pub spec: NodeSpec,
}

#[async_trait]
impl VertexWork for NodeVertex {
    async fn apply(&self, ctx: &GraphContext) -> Result<(), GraphError> {
        let output: NodeOutput = self
            .provider
            .create_node(&self.spec)
            .await
            .map_err(|e| GraphError::VertexFailed(self.id.clone(), e.to_string()))?;
        ctx.events.emit(
            Event::new("node_ready", "engine")
                .with("node", self.spec.name.clone())
                .with("public_ip", output.public_ip.clone()),
        );
        ctx.outputs.publish(&self.id, output);
        Ok(())
    }
}

/// Creates one provider's firewall, scoped to the nodes it protects.
pub struct FirewallVertex {
    pub id: String,
    pub provider: Arc<dyn Provider>,
    pub rules: Vec<FirewallRule>,
    /// The `NodeVertex` ids (not node names) whose outputs this firewall covers.
    pub node_vertex_ids: Vec<String>,
}

#[async_trait]
impl VertexWork for FirewallVertex {
    async fn apply(&self, ctx: &GraphContext) -> Result<(), GraphError> {
        let mut names = Vec::with_capacity(self.node_vertex_ids.len());
        for id in &self.node_vertex_ids {
            let output: NodeOutput = ctx.outputs.get(id)?;
            names.push(output.name);
        }
        let output: FirewallOutput = self
            .provider
            .create_firewall(&self.rules, &names)
            .await
            .map_err(|e| GraphError::VertexFailed(self.id.clone(), e.to_string()))?;
        ctx.outputs.publish(&self.id, output);
        Ok(())
    }
}

pub const MESH_VERTEX_ID: &str = "mesh";
pub const MESH_OUTPUTS_KEY: &str = "mesh:outputs";
pub const BOOTSTRAP_VERTEX_ID: &str = "bootstrap";

fn remote_target(node: &NodeOutput, ssh_key_path: &str) -> Target {
    Target::new(node.public_ip.clone(), node.ssh_user.clone(), ssh_key_path.to_string())
}

/// Generates keypairs, assigns overlay IPs, programs every node's interface
/// and waits for first-peer reachability (§4.4). When the manifest disables
/// the mesh, this vertex is a pass-through that republishes the raw
/// provider-observed outputs with no overlay IP set.
pub struct MeshVertex {
    /// The `NodeVertex` id and originating spec for every node in the cluster.
    pub node_vertex_ids: Vec<String>,
    pub node_specs: Vec<NodeSpec>,
    pub mesh_enabled: bool,
    pub subnet_base: Ipv4Addr,
    pub listen_port: u16,
    pub keepalive_secs: u16,
    pub ssh_key_path: String,
    pub executor: Arc<dyn RemoteExecutor>,
}

#[async_trait]
impl VertexWork for MeshVertex {
    async fn apply(&self, ctx: &GraphContext) -> Result<(), GraphError> {
        let mut outputs: Vec<NodeOutput> = Vec::with_capacity(self.node_vertex_ids.len());
        for id in &self.node_vertex_ids {
            outputs.push(ctx.outputs.get(id)?);
        }

        if !self.mesh_enabled {
            let by_name: HashMap<String, NodeOutput> =
                outputs.into_iter().map(|o| (o.name.clone(), o)).collect();
            ctx.outputs.publish(MESH_OUTPUTS_KEY, by_name);
            return Ok(());
        }

        let keypairs: HashMap<String, Keypair> =
            outputs.iter().map(|o| (o.name.clone(), generate_keypair())).collect();

        let plan = build_mesh_plan(
            &outputs,
            &self.node_specs,
            &keypairs,
            self.subnet_base,
            self.listen_port,
            self.keepalive_secs,
        )
        .map_err(|e| GraphError::VertexFailed(MESH_VERTEX_ID.to_string(), e.to_string()))?;

        for node in &outputs {
            let target = remote_target(node, &self.ssh_key_path);
            let cfg = plan
                .configs
                .iter()
                .find(|c| c.node_name == node.name)
                .expect("every node has a mesh config");
            let script = format!(
                "wg-quick-apply --address {} --private-key {} --listen-port {} --peers {}",
                cfg.interface.address,
                cfg.interface.private_key,
                cfg.interface.listen_port,
                cfg.peers.len()
            );
            self.executor
                .execute(&target, &script)
                .await
                .map_err(|e| GraphError::VertexFailed(node.name.clone(), e.to_string()))?;
        }

        for node in &outputs {
            let target = remote_target(node, &self.ssh_key_path);
            let peer_ips: Vec<String> = plan
                .overlay_ips
                .iter()
                .filter(|(name, _)| *name != &node.name)
                .map(|(_, ip)| ip.to_string())
                .collect();
            if let Err(e) =
                wait_for_peer_reachability(self.executor.as_ref(), &target, &node.name, &peer_ips, &ctx.cancel).await
            {
                ctx.events.emit(
                    Event::new("mesh_peer_failed", "engine")
                        .with("node", node.name.clone())
                        .with("error", e.to_string()),
                );
                return Err(GraphError::VertexFailed(node.name.clone(), e.to_string()));
            }
        }

        let by_name: HashMap<String, NodeOutput> = outputs
            .into_iter()
            .map(|mut o| {
                let ip = plan.overlay_ips[&o.name];
                o.overlay_ip = Some(ip.to_string());
                (o.name.clone(), o)
            })
            .collect();

        ctx.events.emit(Event::new("mesh_ready", "engine").with("nodes", by_name.len().to_string()));
        ctx.outputs.publish(MESH_OUTPUTS_KEY, by_name);
        Ok(())
    }
}

/// Drives the RKE2 install/join protocol to completion (§4.5).
pub struct BootstrapVertex {
    pub master_names: Vec<String>,
    pub worker_names: Vec<String>,
    pub settings: BootstrapSettings,
    pub executor: Arc<dyn RemoteExecutor>,
}

#[async_trait]
impl VertexWork for BootstrapVertex {
    async fn apply(&self, ctx: &GraphContext) -> Result<(), GraphError> {
        let by_name: HashMap<String, NodeOutput> = ctx.outputs.get(MESH_OUTPUTS_KEY)?;
        let masters: Vec<NodeOutput> = self
            .master_names
            .iter()
            .map(|name| {
                by_name
                    .get(name)
                    .cloned()
                    .ok_or_else(|| GraphError::MissingOutput(name.clone()))
            })
            .collect::<Result<_, _>>()?;
        let workers: Vec<NodeOutput> = self
            .worker_names
            .iter()
            .map(|name| {
                by_name
                    .get(name)
                    .cloned()
                    .ok_or_else(|| GraphError::MissingOutput(name.clone()))
            })
            .collect::<Result<_, _>>()?;

        let bootstrapper = ClusterBootstrapper::new(self.executor.as_ref(), ctx.cancel.clone(), Some(&ctx.events));
        let outcome: BootstrapOutcome = bootstrapper
            .run(&masters, &workers, &self.settings)
            .await
            .map_err(|e| GraphError::VertexFailed(BOOTSTRAP_VERTEX_ID.to_string(), e.to_string()))?;

        ctx.outputs.publish(BOOTSTRAP_VERTEX_ID, outcome);
        Ok(())
    }
}

/// Installs Helm and the optional monitoring stack (§4.5 addon phase).
/// Failures here are logged as events but never fail reconciliation as a
/// whole, since the cluster is already `ClusterReady` by the time this runs.
pub struct AddonVertex {
    pub monitoring_enabled: bool,
    pub executor: Arc<dyn RemoteExecutor>,
    pub ssh_key_path: String,
}

#[async_trait]
impl VertexWork for AddonVertex {
    async fn apply(&self, ctx: &GraphContext) -> Result<(), GraphError> {
        let outcome: BootstrapOutcome = ctx.outputs.get(BOOTSTRAP_VERTEX_ID)?;
        let by_name: HashMap<String, NodeOutput> = ctx.outputs.get(MESH_OUTPUTS_KEY)?;
        let first_master = by_name
            .get(&outcome.first_master)
            .ok_or_else(|| GraphError::MissingOutput(outcome.first_master.clone()))?;
        let target = remote_target(first_master, &self.ssh_key_path);

        let report = fleetwright_bootstrap::install_addons(self.executor.as_ref(), &target, self.monitoring_enabled).await;
        for failure in &report.failures {
            tracing::warn!(failure = %failure, "addon step failed, continuing");
            ctx.events.emit(Event::new("addon_step_failed", "engine").with("detail", failure.clone()));
        }
        Ok(())
    }
}
