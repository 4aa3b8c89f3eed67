//! The top-level facade: builds the resource graph for a manifest, walks
//! it, and records the manifest's content-addressed revision.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use fleetwright_bootstrap::{BootstrapOutcome, BootstrapSettings};
use fleetwright_common::EventEmitter;
use fleetwright_exec::RemoteExecutor;
use fleetwright_graph::{GraphContext, ReconcileReport, ResourceGraph, ResourceNode, VertexKind};
use fleetwright_mesh::{DEFAULT_KEEPALIVE_SECS, DEFAULT_LISTEN_PORT};
use fleetwright_provider::{NetworkSpec, Provider, ProviderFactory, ProviderRegistry};
use fleetwright_registry::ManifestRegistry;
use fleetwright_types::{ClusterManifest, Event, ManifestRecord};
use rand::RngCore;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::validate::validate_manifest;
use crate::vertices::{
    default_firewall_rules, AddonVertex, BootstrapVertex, FirewallVertex, MeshVertex, NetworkVertex, NodeVertex,
    BOOTSTRAP_VERTEX_ID, MESH_VERTEX_ID,
};

const DEFAULT_CONCURRENCY: usize = 8;
const DEFAULT_SSH_KEY_PATH: &str = "~/.ssh/id_rsa";

/// Everything produced by one `reconcile` call: the registry's recorded
/// revision of the manifest that was applied, the per-vertex graph report,
/// and (when bootstrap ran) its outcome.
pub struct ReconcileOutcome {
    pub record: ManifestRecord,
    pub report: ReconcileReport,
    pub bootstrap: Option<BootstrapOutcome>,
}

pub struct Engine {
    provider_factory: ProviderFactory,
    executor: Arc<dyn RemoteExecutor>,
    registry: ManifestRegistry,
    events: EventEmitter,
    concurrency: usize,
}

impl Engine {
    pub fn new(provider_registry: ProviderRegistry, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            provider_factory: ProviderFactory::new(provider_registry),
            executor,
            registry: ManifestRegistry::new(),
            events: EventEmitter::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Replaces the default-buffered event bus with one sized to the
    /// caller's own `EngineArgs::event_buffer` (§6: engine configuration is
    /// ambient, not part of the declarative manifest).
    pub fn with_event_buffer(mut self, buffer: usize) -> Self {
        self.events = EventEmitter::with_buffer(buffer);
        self
    }

    /// A clone of the event bus; subscribe to watch reconciliation progress.
    pub fn events(&self) -> EventEmitter {
        self.events.clone()
    }

    pub fn manifest_registry(&self) -> &ManifestRegistry {
        &self.registry
    }

    /// Validates, builds the resource graph, and applies it, bringing the
    /// manifest's desired state into being (§4.1-§4.5). Every call also
    /// records the manifest's content-addressed revision in the registry
    /// (§4.10), regardless of whether reconciliation itself succeeds.
    pub async fn reconcile(&self, manifest: &ClusterManifest) -> Result<ReconcileOutcome, EngineError> {
        validate_manifest(manifest)?;

        let record = self.record_manifest(manifest).await;

        let providers = self.provider_factory.build_all(&manifest.providers)?;
        let graph = self.build_graph(manifest, &providers)?;

        let cancel = CancellationToken::new();
        let ctx = GraphContext::new(self.events.clone(), cancel);
        ctx.events.emit(Event::new("reconcile_started", "engine").with("cluster", manifest.name.clone()));

        let report = graph.apply(&ctx, self.concurrency).await?;

        let bootstrap = ctx.outputs.get(BOOTSTRAP_VERTEX_ID).ok();
        if report.all_ok() {
            ctx.events.emit(Event::new("reconcile_completed", "engine").with("cluster", manifest.name.clone()));
        }
        let report = report.into_result()?;

        Ok(ReconcileOutcome { record, report, bootstrap })
    }

    async fn record_manifest(&self, manifest: &ClusterManifest) -> ManifestRecord {
        let content = serde_json::to_value(manifest).unwrap_or(serde_json::Value::Null);
        self.registry
            .register(&manifest.name, "cluster", content, HashMap::new(), chrono::Utc::now())
            .await
    }

    fn build_graph(
        &self,
        manifest: &ClusterManifest,
        providers: &HashMap<fleetwright_types::CloudProvider, Arc<dyn Provider>>,
    ) -> Result<ResourceGraph, EngineError> {
        let mut graph = ResourceGraph::new();

        let providers_used: Vec<fleetwright_types::CloudProvider> =
            manifest.enabled_providers().into_iter().map(|p| p.provider).collect();

        for provider_kind in &providers_used {
            let provider = providers[provider_kind].clone();
            let zones: Vec<String> = manifest
                .node_pools
                .values()
                .filter(|p| p.provider == *provider_kind)
                .flat_map(|p| p.zones.clone())
                .collect();
            let network_id = format!("network:{provider_kind}");
            graph.add(ResourceNode::new(
                network_id,
                VertexKind::Network,
                vec![],
                Arc::new(NetworkVertex {
                    id: format!("network:{provider_kind}"),
                    provider,
                    spec: NetworkSpec {
                        name: format!("{}-{provider_kind}", manifest.name),
                        cidr: manifest.network.pod_cidr.clone(),
                        zones,
                    },
                }),
            ));
        }

        let mut pool_names: Vec<&String> = manifest.node_pools.keys().collect();
        pool_names.sort();

        let mut node_ids_by_provider: HashMap<fleetwright_types::CloudProvider, Vec<String>> = HashMap::new();
        let mut all_node_ids: Vec<String> = Vec::new();

        for pool_name in &pool_names {
            let pool = &manifest.node_pools[*pool_name];
            let provider = providers
                .get(&pool.provider)
                .ok_or_else(|| EngineError::Config(format!("pool '{pool_name}': provider not built")))?
                .clone();
            let network_id = format!("network:{}", pool.provider);
            for spec in pool.expand() {
                let node_id = format!("node:{}", spec.name);
                graph.add(ResourceNode::new(
                    node_id.clone(),
                    VertexKind::Node,
                    vec![network_id.clone()],
                    Arc::new(NodeVertex {
                        id: node_id.clone(),
                        provider: provider.clone(),
                        spec,
                    }),
                ));
                node_ids_by_provider.entry(pool.provider).or_default().push(node_id.clone());
                all_node_ids.push(node_id);
            }
        }

        for provider_kind in &providers_used {
            let provider = providers[provider_kind].clone();
            let node_vertex_ids = node_ids_by_provider.get(provider_kind).cloned().unwrap_or_default();
            graph.add(ResourceNode::new(
                format!("firewall:{provider_kind}"),
                VertexKind::Firewall,
                node_vertex_ids.clone(),
                Arc::new(FirewallVertex {
                    id: format!("firewall:{provider_kind}"),
                    provider,
                    rules: default_firewall_rules(&manifest.network.overlay_subnet),
                    node_vertex_ids,
                }),
            ));
        }

        let ssh_key_path = manifest
            .security
            .ssh_private_key_path
            .clone()
            .unwrap_or_else(|| DEFAULT_SSH_KEY_PATH.to_string());

        let subnet_base = overlay_network_address(&manifest.network.overlay_subnet)?;

        graph.add(ResourceNode::new(
            MESH_VERTEX_ID,
            VertexKind::Network,
            all_node_ids.clone(),
            Arc::new(MeshVertex {
                node_vertex_ids: all_node_ids,
                node_specs: manifest.all_node_specs(),
                mesh_enabled: manifest.network.mesh_enabled,
                subnet_base,
                listen_port: DEFAULT_LISTEN_PORT,
                keepalive_secs: DEFAULT_KEEPALIVE_SECS,
                ssh_key_path: ssh_key_path.clone(),
                executor: self.executor.clone(),
            }),
        ));

        graph.add(ResourceNode::new(
            BOOTSTRAP_VERTEX_ID,
            VertexKind::Bootstrap,
            vec![MESH_VERTEX_ID.to_string()],
            Arc::new(BootstrapVertex {
                master_names: manifest.masters().into_iter().map(|m| m.name).collect(),
                worker_names: manifest.workers().into_iter().map(|w| w.name).collect(),
                settings: BootstrapSettings {
                    version: manifest.kubernetes.version.clone(),
                    cni: manifest.kubernetes.cni.clone(),
                    disabled_components: manifest.kubernetes.disabled_components.clone(),
                    secrets_encryption: true,
                    snapshot_schedule: None,
                    token: generate_cluster_token(),
                    ssh_key_path: ssh_key_path.clone(),
                },
                executor: self.executor.clone(),
            }),
        ));

        graph.add(ResourceNode::new(
            "addon",
            VertexKind::Addon,
            vec![BOOTSTRAP_VERTEX_ID.to_string()],
            Arc::new(AddonVertex {
                monitoring_enabled: manifest.monitoring_enabled,
                executor: self.executor.clone(),
                ssh_key_path,
            }),
        ));

        Ok(graph)
    }
}

/// Extracts the `/24`'s network address from `overlay_subnet` (e.g.
/// `"10.8.0.0/24"` -> `10.8.0.0`); the mesh crate only needs the base
/// address, not the prefix.
fn overlay_network_address(overlay_subnet: &str) -> Result<Ipv4Addr, EngineError> {
    let addr = overlay_subnet
        .split('/')
        .next()
        .ok_or_else(|| EngineError::Config(format!("invalid overlay subnet '{overlay_subnet}'")))?;
    addr.parse()
        .map_err(|_| EngineError::Config(format!("invalid overlay subnet '{overlay_subnet}'")))
}

fn generate_cluster_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwright_exec::FakeExecutor;
    use fleetwright_provider::FakeProvider;
    use fleetwright_types::{
        AutoscalingConfig, BackupConfig, CloudProvider, KubernetesConfig, NetworkConfig, NodePool, NodeRole,
        ProviderConfig, SecurityConfig,
    };
    use std::collections::HashMap as Map;

    fn registry_with_fake_digitalocean() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(
            CloudProvider::DigitalOcean,
            Arc::new(|_| Arc::new(FakeProvider::new(CloudProvider::DigitalOcean))),
        );
        registry
    }

    fn manifest() -> ClusterManifest {
        let mut node_pools = Map::new();
        node_pools.insert(
            "masters".to_string(),
            NodePool {
                name: "masters".to_string(),
                provider: CloudProvider::DigitalOcean,
                count: 3,
                min: None,
                max: None,
                size: "s-2vcpu-4gb".to_string(),
                region: "nyc3".to_string(),
                image: "ubuntu-22-04-x64".to_string(),
                roles: vec![NodeRole::Master],
                labels: Map::new(),
                taints: vec![],
                spot: false,
                zones: vec![],
            },
        );
        node_pools.insert(
            "workers".to_string(),
            NodePool {
                name: "workers".to_string(),
                provider: CloudProvider::DigitalOcean,
                count: 2,
                min: None,
                max: None,
                size: "s-2vcpu-4gb".to_string(),
                region: "nyc3".to_string(),
                image: "ubuntu-22-04-x64".to_string(),
                roles: vec![NodeRole::Worker],
                labels: Map::new(),
                taints: vec![],
                spot: false,
                zones: vec![],
            },
        );
        ClusterManifest {
            name: "demo".to_string(),
            environment: "staging".to_string(),
            providers: vec![ProviderConfig {
                provider: CloudProvider::DigitalOcean,
                enabled: true,
                credentials: [("token".to_string(), "abc".to_string())].into_iter().collect(),
            }],
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
        }
    }

    #[tokio::test]
    async fn reconcile_brings_up_a_small_cluster_end_to_end() {
        let executor: Arc<dyn RemoteExecutor> = Arc::new(FakeExecutor::new(Box::new(|_, script| {
            if script.contains("node-token") {
                Ok(fleetwright_exec::CommandOutput {
                    stdout: "shared-secret-token".to_string(),
                    stderr: String::new(),
                    exit_code: 0,
                })
            } else {
                Ok(fleetwright_exec::CommandOutput::default())
            }
        })));
        let engine = Engine::new(registry_with_fake_digitalocean(), executor);

        let outcome = engine.reconcile(&manifest()).await.unwrap();
        assert!(outcome.report.all_ok());
        assert_eq!(outcome.record.version, "v1");
        let bootstrap = outcome.bootstrap.expect("bootstrap vertex ran");
        assert_eq!(bootstrap.first_master, "masters-0");
    }

    #[tokio::test]
    async fn invalid_manifest_is_rejected_before_any_provider_call() {
        let executor: Arc<dyn RemoteExecutor> = Arc::new(FakeExecutor::always_ok());
        let engine = Engine::new(registry_with_fake_digitalocean(), executor);
        let mut bad = manifest();
        bad.name = String::new();
        let err = engine.reconcile(&bad).await.unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[tokio::test]
    async fn reconciling_twice_bumps_the_registry_version() {
        let executor: Arc<dyn RemoteExecutor> = Arc::new(FakeExecutor::always_ok());
        let engine = Engine::new(registry_with_fake_digitalocean(), executor);
        let m = manifest();
        engine.reconcile(&m).await.unwrap();
        let mut second = m.clone();
        second.monitoring_enabled = true;
        let outcome = engine.reconcile(&second).await.unwrap();
        assert_eq!(outcome.record.version, "v2");
    }
}
