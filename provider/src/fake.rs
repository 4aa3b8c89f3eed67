//! An in-memory reference driver. Exercised by the graph/bootstrap test
//! suites in place of a real cloud; also doubles as executable documentation
//! of the contract every real driver must satisfy.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use fleetwright_types::{CloudProvider, ClusterManifest, NodeOutput, NodeSpec, NodeStatus};

use crate::error::ProviderError;
use crate::{FirewallOutput, FirewallRule, NetworkOutput, NetworkSpec, Provider};

pub struct FakeProvider {
    kind: CloudProvider,
    nodes: Mutex<HashMap<String, NodeOutput>>,
    next_octet: Mutex<u8>,
}

impl FakeProvider {
    pub fn new(kind: CloudProvider) -> Self {
        Self {
            kind,
            nodes: Mutex::new(HashMap::new()),
            next_octet: Mutex::new(10),
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> CloudProvider {
        self.kind
    }

    async fn initialize(&self, _manifest: &ClusterManifest) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkOutput, ProviderError> {
        Ok(NetworkOutput {
            id: format!("net-{}", spec.name),
            cidr: spec.cidr.clone(),
            subnets: spec.zones.iter().map(|z| format!("{z}-subnet")).collect(),
        })
    }

    async fn create_node(&self, spec: &NodeSpec) -> Result<NodeOutput, ProviderError> {
        let mut nodes = self.nodes.lock().expect("fake provider lock");
        if let Some(existing) = nodes.get(&spec.name) {
            return Ok(existing.clone());
        }
        let mut octet = self.next_octet.lock().expect("fake provider lock");
        let assigned = *octet;
        *octet = octet.saturating_add(1);
        let output = NodeOutput {
            name: spec.name.clone(),
            provider: spec.provider,
            region: spec.region.clone(),
            size: spec.size.clone(),
            public_ip: format!("203.0.113.{assigned}"),
            private_ip: Some(format!("10.0.0.{assigned}")),
            overlay_ip: None,
            ssh_user: "root".to_string(),
            labels: spec.labels.clone(),
            status: NodeStatus::Running,
        };
        nodes.insert(spec.name.clone(), output.clone());
        Ok(output)
    }

    async fn create_firewall(
        &self,
        _rules: &[FirewallRule],
        node_ids: &[String],
    ) -> Result<FirewallOutput, ProviderError> {
        Ok(FirewallOutput {
            id: format!("fw-{}", node_ids.len()),
        })
    }

    async fn get_regions(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["nyc3".to_string(), "sfo3".to_string()])
    }

    async fn get_sizes(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["s-2vcpu-4gb".to_string(), "s-4vcpu-8gb".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spec(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            pool: "workers".to_string(),
            provider: CloudProvider::DigitalOcean,
            size: "s-2vcpu-4gb".to_string(),
            region: "nyc3".to_string(),
            image: "ubuntu-22-04-x64".to_string(),
            roles: vec![],
            labels: HashMap::new(),
            taints: vec![],
            spot: false,
            zone: None,
        }
    }

    #[tokio::test]
    async fn create_node_is_idempotent_by_name() {
        let p = FakeProvider::new(CloudProvider::DigitalOcean);
        let a = p.create_node(&spec("workers-0")).await.unwrap();
        let b = p.create_node(&spec("workers-0")).await.unwrap();
        assert_eq!(a.public_ip, b.public_ip);
    }

    #[tokio::test]
    async fn distinct_nodes_get_distinct_addresses() {
        let p = FakeProvider::new(CloudProvider::DigitalOcean);
        let a = p.create_node(&spec("workers-0")).await.unwrap();
        let b = p.create_node(&spec("workers-1")).await.unwrap();
        assert_ne!(a.public_ip, b.public_ip);
    }
}
