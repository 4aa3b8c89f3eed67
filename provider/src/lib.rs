//! The cloud provider abstraction (component C2): a uniform contract every
//! cloud driver implements, a string-keyed registry with a validating
//! factory, and a retry-decorating wrapper built on `fleetwright-common`'s
//! backoff kernel.

mod error;
mod fake;
mod registry;
mod retry;

pub use error::ProviderError;
pub use fake::FakeProvider;
pub use registry::{ProviderFactory, ProviderRegistry};
pub use retry::RetryingProvider;

use async_trait::async_trait;
use fleetwright_types::{CloudProvider, ClusterManifest, NodeOutput, NodeSpec};

/// One created or discovered network.
#[derive(Clone, Debug)]
pub struct NetworkOutput {
    pub id: String,
    pub cidr: String,
    pub subnets: Vec<String>,
}

/// Desired shape of a network to create.
#[derive(Clone, Debug)]
pub struct NetworkSpec {
    pub name: String,
    pub cidr: String,
    pub zones: Vec<String>,
}

/// One firewall rule, mirrored from the external wire format (§6).
#[derive(Clone, Debug)]
pub struct FirewallRule {
    pub protocol: String,
    pub port_range: String,
    pub source_cidrs: Vec<String>,
    pub description: String,
}

#[derive(Clone, Debug)]
pub struct FirewallOutput {
    pub id: String,
}

#[derive(Clone, Debug)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub target_node_names: Vec<String>,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoadBalancerOutput {
    pub id: String,
    pub public_ip: String,
}

/// Uniform contract every cloud driver implements (§4.2). Every `create_*`
/// call MUST be idempotent with respect to re-issue against the same stable
/// name: a provider that already holds a resource with that name returns it
/// rather than creating a duplicate.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> CloudProvider;

    /// Prepares credentials, SSH key material and any per-provider
    /// scaffolding the manifest requires. Called once before any `create_*`.
    async fn initialize(&self, manifest: &ClusterManifest) -> Result<(), ProviderError>;

    async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkOutput, ProviderError>;

    async fn create_node(&self, spec: &NodeSpec) -> Result<NodeOutput, ProviderError>;

    /// N-fold convenience: expands the pool into its per-node specs (each
    /// already carrying its round-robin zone, per `NodePool::expand`) and
    /// creates every node. Overlay-IP assignment is owned by the mesh
    /// coordinator (§4.4), not this call; drivers rarely need to override
    /// the default implementation.
    async fn create_node_pool(
        &self,
        pool: &fleetwright_types::NodePool,
    ) -> Result<Vec<NodeOutput>, ProviderError> {
        let mut outputs = Vec::new();
        for spec in pool.expand() {
            outputs.push(self.create_node(&spec).await?);
        }
        Ok(outputs)
    }

    async fn create_firewall(
        &self,
        rules: &[FirewallRule],
        node_ids: &[String],
    ) -> Result<FirewallOutput, ProviderError>;

    /// Load balancers are optional; the default errs as unsupported.
    async fn create_load_balancer(
        &self,
        _spec: &LoadBalancerSpec,
    ) -> Result<LoadBalancerOutput, ProviderError> {
        Err(ProviderError::Unsupported("load balancers"))
    }

    async fn get_regions(&self) -> Result<Vec<String>, ProviderError>;

    async fn get_sizes(&self) -> Result<Vec<String>, ProviderError>;

    /// Best-effort resource release. IaC-engine-backed drivers may no-op and
    /// rely on the external state file instead.
    async fn cleanup(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

