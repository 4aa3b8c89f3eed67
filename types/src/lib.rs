//! Shared data model for the cluster orchestration engine.
//!
//! Every other crate in the workspace depends on this one and only this one;
//! it carries no behavior, only the desired-state and observed-state shapes
//! that flow between the reconciler, the mesh coordinator, the bootstrap
//! state machine, and the control loops.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The cloud a node pool or provider configuration targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    DigitalOcean,
    Aws,
    Gcp,
    Azure,
    Linode,
    OnPrem,
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CloudProvider::DigitalOcean => "digitalocean",
            CloudProvider::Aws => "aws",
            CloudProvider::Gcp => "gcp",
            CloudProvider::Azure => "azure",
            CloudProvider::Linode => "linode",
            CloudProvider::OnPrem => "onprem",
        };
        f.write_str(s)
    }
}

/// A role a node plays in the Kubernetes distribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Master,
    ControlPlane,
    Etcd,
    Worker,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeRole::Master => "master",
            NodeRole::ControlPlane => "controlplane",
            NodeRole::Etcd => "etcd",
            NodeRole::Worker => "worker",
        };
        f.write_str(s)
    }
}

/// Network-level configuration for a cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub pod_cidr: String,
    pub service_cidr: String,
    pub overlay_subnet: String,
    #[serde(default = "default_true")]
    pub mesh_enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Security-related configuration: SSH material and bastion toggle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub ssh_public_key_path: Option<String>,
    pub ssh_private_key_path: Option<String>,
    #[serde(default)]
    pub bastion_enabled: bool,
}

/// Kubernetes distribution configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default = "default_distribution")]
    pub distribution: String,
    pub version: String,
    #[serde(default = "default_cni")]
    pub cni: String,
    #[serde(default)]
    pub disabled_components: Vec<String>,
    #[serde(default)]
    pub addons: Vec<String>,
}

fn default_distribution() -> String {
    "rke2".to_string()
}

fn default_cni() -> String {
    "canal".to_string()
}

/// One provider's credentials and enable flag within a manifest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: CloudProvider,
    #[serde(default)]
    pub enabled: bool,
    /// Opaque credential bag; the engine never inspects these keys itself,
    /// it only forwards the whole map to the matching `Provider` driver.
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

/// Desired shape of one named pool of nodes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodePool {
    pub name: String,
    pub provider: CloudProvider,
    pub count: u32,
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
    pub size: String,
    pub region: String,
    pub image: String,
    pub roles: Vec<NodeRole>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub taints: Vec<String>,
    #[serde(default)]
    pub spot: bool,
    #[serde(default)]
    pub zones: Vec<String>,
}

impl NodePool {
    /// Expand this pool into the stable `<pool>-<index>` node specs it owns.
    pub fn expand(&self) -> Vec<NodeSpec> {
        (0..self.count)
            .map(|index| NodeSpec {
                name: format!("{}-{}", self.name, index),
                pool: self.name.clone(),
                provider: self.provider,
                size: self.size.clone(),
                region: self.region.clone(),
                image: self.image.clone(),
                roles: self.roles.clone(),
                labels: self.labels.clone(),
                taints: self.taints.clone(),
                spot: self.spot,
                zone: self
                    .zones
                    .get(index as usize % self.zones.len().max(1))
                    .cloned(),
            })
            .collect()
    }

    pub fn has_role(&self, role: NodeRole) -> bool {
        self.roles.contains(&role)
    }
}

/// One concrete node to be created, resolved from a `NodePool`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub pool: String,
    pub provider: CloudProvider,
    pub size: String,
    pub region: String,
    pub image: String,
    pub roles: Vec<NodeRole>,
    pub labels: HashMap<String, String>,
    pub taints: Vec<String>,
    pub spot: bool,
    pub zone: Option<String>,
}

impl NodeSpec {
    pub fn has_role(&self, role: NodeRole) -> bool {
        self.roles.contains(&role)
    }
}

/// Observed fact about a provisioned node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeOutput {
    pub name: String,
    pub provider: CloudProvider,
    pub region: String,
    pub size: String,
    pub public_ip: String,
    pub private_ip: Option<String>,
    pub overlay_ip: Option<String>,
    pub ssh_user: String,
    pub labels: HashMap<String, String>,
    pub status: NodeStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Provisioning,
    Running,
    Terminating,
    Error,
}

/// Autoscaling configuration attached to a manifest.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AutoscalingConfig {
    #[serde(default)]
    pub enabled: bool,
    pub pool: Option<String>,
    pub min_nodes: Option<u32>,
    pub max_nodes: Option<u32>,
    pub target_cpu_percent: Option<f64>,
    pub target_memory_percent: Option<f64>,
    pub scale_up_cooldown_secs: Option<u64>,
    pub scale_down_delay_secs: Option<u64>,
}

/// Backup configuration attached to a manifest.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default)]
    pub enabled: bool,
    pub schedule_interval_secs: Option<u64>,
    pub retention_days: Option<u32>,
    pub components: Option<Vec<String>>,
}

/// Root desired-state document the engine consumes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterManifest {
    pub name: String,
    pub environment: String,
    pub providers: Vec<ProviderConfig>,
    pub network: NetworkConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    pub node_pools: HashMap<String, NodePool>,
    pub kubernetes: KubernetesConfig,
    #[serde(default)]
    pub autoscaling: AutoscalingConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub monitoring_enabled: bool,
}

impl ClusterManifest {
    /// All node specs across every pool, in pool-name lex order then index order.
    pub fn all_node_specs(&self) -> Vec<NodeSpec> {
        let mut names: Vec<&String> = self.node_pools.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| self.node_pools[name].expand())
            .collect()
    }

    pub fn masters(&self) -> Vec<NodeSpec> {
        self.all_node_specs()
            .into_iter()
            .filter(|n| n.has_role(NodeRole::Master))
            .collect()
    }

    pub fn workers(&self) -> Vec<NodeSpec> {
        self.all_node_specs()
            .into_iter()
            .filter(|n| n.has_role(NodeRole::Worker))
            .collect()
    }

    pub fn enabled_providers(&self) -> Vec<&ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }
}

/// Lifecycle status of a registered manifest revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    Pending,
    Applied,
    Failed,
    Deleted,
    OutOfSync,
}

/// One content-addressed revision tracked by the manifest registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub name: String,
    pub kind: String,
    pub version: String,
    pub hash: String,
    pub parent_hash: Option<String>,
    pub content: serde_json::Value,
    pub status: ManifestStatus,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
}

/// A bounded, newest-first history of past revisions for one manifest name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ManifestHistory {
    pub name: String,
    pub entries: Vec<ManifestRecord>,
}

/// One node's identity within the overlay mesh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VPNPeer {
    pub node_name: String,
    pub public_key: String,
    pub overlay_ip: String,
    pub endpoint: String,
    pub allowed_ips: String,
    pub persistent_keepalive_secs: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    InProgress,
    Completed,
    Failed,
}

/// One backup snapshot envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Backup {
    pub id: String,
    pub components: Vec<String>,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: BackupStatus,
    pub location: String,
}

/// Current state of the autoscaling control loop for one cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AutoScalingStatus {
    pub enabled: bool,
    pub current_nodes: u32,
    pub min_nodes: u32,
    pub max_nodes: u32,
    pub strategy: String,
    pub last_scale_up: Option<DateTime<Utc>>,
    pub last_scale_down: Option<DateTime<Utc>>,
    pub running: bool,
}

/// A per-resource cost projection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CostEstimate {
    pub hourly: f64,
    pub monthly: f64,
    pub yearly: f64,
    pub currency: String,
    pub spot: bool,
    pub spot_savings_percent: Option<f64>,
    pub breakdown: HashMap<String, f64>,
}

/// A single observable event published onto the event bus.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: i64,
    pub data: HashMap<String, String>,
    pub source: String,
}

impl Event {
    pub fn new(kind: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: Utc::now().timestamp(),
            data: HashMap::new(),
            source: source.into(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(name: &str, count: u32, roles: Vec<NodeRole>) -> NodePool {
        NodePool {
            name: name.to_string(),
            provider: CloudProvider::DigitalOcean,
            count,
            min: None,
            max: None,
            size: "s-2vcpu-4gb".to_string(),
            region: "nyc3".to_string(),
            image: "ubuntu-22-04-x64".to_string(),
            roles,
            labels: HashMap::new(),
            taints: Vec::new(),
            spot: false,
            zones: Vec::new(),
        }
    }

    #[test]
    fn pool_expands_to_stable_indexed_names() {
        let p = pool("workers", 3, vec![NodeRole::Worker]);
        let specs = p.expand();
        assert_eq!(
            specs.iter().map(|s| s.name.clone()).collect::<Vec<_>>(),
            vec!["workers-0", "workers-1", "workers-2"]
        );
    }

    #[test]
    fn manifest_separates_masters_and_workers() {
        let mut node_pools = HashMap::new();
        node_pools.insert("masters".to_string(), pool("masters", 3, vec![NodeRole::Master]));
        node_pools.insert("workers".to_string(), pool("workers", 2, vec![NodeRole::Worker]));
        let manifest = ClusterManifest {
            name: "demo".to_string(),
            environment: "prod".to_string(),
            providers: vec![],
            network: NetworkConfig {
                pod_cidr: "10.42.0.0/16".to_string(),
                service_cidr: "10.43.0.0/16".to_string(),
                overlay_subnet: "10.8.0.0/24".to_string(),
                mesh_enabled: true,
            },
            security: SecurityConfig::default(),
            node_pools,
            kubernetes: KubernetesConfig {
                distribution: "rke2".to_string(),
                version: "v1.30.0+rke2r1".to_string(),
                cni: "canal".to_string(),
                disabled_components: vec![],
                addons: vec![],
            },
            autoscaling: AutoscalingConfig::default(),
            backup: BackupConfig::default(),
            monitoring_enabled: false,
        };
        assert_eq!(manifest.masters().len(), 3);
        assert_eq!(manifest.workers().len(), 2);
    }
}
