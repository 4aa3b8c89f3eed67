//! Overlay-IP assignment and full-mesh peer-list construction (§4.4).
//!
//! Offsets within the configured `/24`: a coordinator-role node (if any) at
//! `.1`, a bastion (if any) at `.2`, master/control-plane/etcd nodes at
//! `.10` upward in lex-name order, workers at `.20` upward in lex-name
//! order.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use fleetwright_types::{NodeOutput, NodeRole, NodeSpec};

use crate::error::MeshError;
use crate::keypair::Keypair;

const MASTER_BASE: u8 = 10;
const WORKER_BASE: u8 = 20;
const BASTION_OCTET: u8 = 2;
const COORDINATOR_OCTET: u8 = 1;

fn is_bastion(spec: &NodeSpec) -> bool {
    spec.labels.get("mesh_role").map(|v| v == "bastion").unwrap_or(false)
}

fn is_coordinator(spec: &NodeSpec) -> bool {
    spec.labels
        .get("mesh_role")
        .map(|v| v == "coordinator")
        .unwrap_or(false)
}

fn is_master_like(spec: &NodeSpec) -> bool {
    spec.roles
        .iter()
        .any(|r| matches!(r, NodeRole::Master | NodeRole::ControlPlane | NodeRole::Etcd))
}

/// Assigns one overlay `/32` per node within `subnet_base` (the network
/// address of the configured `/24`, e.g. `10.8.0.0`). Deterministic: the
/// same input always produces the same assignment, which is what makes the
/// concrete scenario in §8 reproducible.
pub fn assign_overlay_ips(
    nodes: &[NodeSpec],
    subnet_base: Ipv4Addr,
) -> Result<HashMap<String, Ipv4Addr>, MeshError> {
    let octets = subnet_base.octets();
    let net = |last: u8| Ipv4Addr::new(octets[0], octets[1], octets[2], last);

    let mut assignment = HashMap::new();

    let coordinator: Vec<&NodeSpec> = nodes.iter().filter(|n| is_coordinator(n)).collect();
    for node in &coordinator {
        assignment.insert(node.name.clone(), net(COORDINATOR_OCTET));
    }

    let bastions: Vec<&NodeSpec> = nodes.iter().filter(|n| is_bastion(n)).collect();
    for node in &bastions {
        assignment.insert(node.name.clone(), net(BASTION_OCTET));
    }

    let mut masters: Vec<&NodeSpec> = nodes
        .iter()
        .filter(|n| is_master_like(n) && !is_bastion(n) && !is_coordinator(n))
        .collect();
    masters.sort_by(|a, b| a.name.cmp(&b.name));
    for (i, node) in masters.iter().enumerate() {
        let last = MASTER_BASE
            .checked_add(i as u8)
            .ok_or_else(|| MeshError::SubnetExhausted(subnet_base.to_string(), nodes.len()))?;
        assignment.insert(node.name.clone(), net(last));
    }

    let mut workers: Vec<&NodeSpec> = nodes
        .iter()
        .filter(|n| !is_master_like(n) && !is_bastion(n) && !is_coordinator(n))
        .collect();
    workers.sort_by(|a, b| a.name.cmp(&b.name));
    for (i, node) in workers.iter().enumerate() {
        let last = WORKER_BASE
            .checked_add(i as u8)
            .ok_or_else(|| MeshError::SubnetExhausted(subnet_base.to_string(), nodes.len()))?;
        assignment.insert(node.name.clone(), net(last));
    }

    Ok(assignment)
}

#[derive(Clone, Debug)]
pub struct InterfaceConfig {
    pub private_key: String,
    pub address: String,
    pub listen_port: u16,
}

#[derive(Clone, Debug)]
pub struct PeerConfig {
    pub public_key: String,
    pub endpoint: String,
    pub allowed_ips: String,
    pub persistent_keepalive_secs: u16,
}

/// One node's complete WireGuard-shaped configuration: its own interface
/// plus a peer block for every other node (full mesh).
#[derive(Clone, Debug)]
pub struct NodeMeshConfig {
    pub node_name: String,
    pub interface: InterfaceConfig,
    pub peers: Vec<PeerConfig>,
}

#[derive(Clone, Debug)]
pub struct MeshPlan {
    pub overlay_ips: HashMap<String, Ipv4Addr>,
    pub configs: Vec<NodeMeshConfig>,
}

/// Builds the full pairwise mesh: every node's config lists every other
/// node as a peer, each peer's `allowed_ips` is exactly that peer's own
/// overlay `/32` (§8: "each peer's AllowedIPs is the single /32 of that
/// peer").
pub fn build_mesh_plan(
    nodes: &[NodeOutput],
    specs: &[NodeSpec],
    keypairs: &HashMap<String, Keypair>,
    subnet_base: Ipv4Addr,
    listen_port: u16,
    keepalive_secs: u16,
) -> Result<MeshPlan, MeshError> {
    let overlay_ips = assign_overlay_ips(specs, subnet_base)?;

    let mut configs = Vec::with_capacity(nodes.len());
    for node in nodes {
        let own_ip = overlay_ips
            .get(&node.name)
            .copied()
            .ok_or_else(|| MeshError::SubnetExhausted(subnet_base.to_string(), nodes.len()))?;
        let own_keypair = keypairs
            .get(&node.name)
            .expect("every node has a generated keypair before mesh planning");

        let mut peers = Vec::new();
        for other in nodes {
            if other.name == node.name {
                continue;
            }
            let peer_ip = overlay_ips
                .get(&other.name)
                .copied()
                .ok_or_else(|| MeshError::SubnetExhausted(subnet_base.to_string(), nodes.len()))?;
            let peer_keypair = keypairs
                .get(&other.name)
                .expect("every node has a generated keypair before mesh planning");
            if other.public_ip.is_empty() {
                return Err(MeshError::MissingPublicIp(other.name.clone()));
            }
            peers.push(PeerConfig {
                public_key: peer_keypair.public_key.clone(),
                endpoint: format!("{}:{}", other.public_ip, listen_port),
                allowed_ips: format!("{peer_ip}/32"),
                persistent_keepalive_secs: keepalive_secs,
            });
        }

        configs.push(NodeMeshConfig {
            node_name: node.name.clone(),
            interface: InterfaceConfig {
                private_key: own_keypair.private_key.clone(),
                address: format!("{own_ip}/32"),
                listen_port,
            },
            peers,
        });
    }

    Ok(MeshPlan { overlay_ips, configs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use fleetwright_types::{CloudProvider, NodeStatus};

    fn spec(name: &str, roles: Vec<NodeRole>) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            pool: "pool".to_string(),
            provider: CloudProvider::DigitalOcean,
            size: "s-2vcpu-4gb".to_string(),
            region: "nyc3".to_string(),
            image: "ubuntu".to_string(),
            roles,
            labels: Map::new(),
            taints: vec![],
            spot: false,
            zone: None,
        }
    }

    #[test]
    fn scenario_two_mesh_assignment() {
        let nodes = vec![
            spec("m1", vec![NodeRole::Master]),
            spec("m2", vec![NodeRole::Master]),
            spec("m3", vec![NodeRole::Master]),
            spec("w1", vec![NodeRole::Worker]),
            spec("w2", vec![NodeRole::Worker]),
        ];
        let assignment = assign_overlay_ips(&nodes, Ipv4Addr::new(10, 8, 0, 0)).unwrap();
        assert_eq!(assignment["m1"], Ipv4Addr::new(10, 8, 0, 10));
        assert_eq!(assignment["m2"], Ipv4Addr::new(10, 8, 0, 11));
        assert_eq!(assignment["m3"], Ipv4Addr::new(10, 8, 0, 12));
        assert_eq!(assignment["w1"], Ipv4Addr::new(10, 8, 0, 20));
        assert_eq!(assignment["w2"], Ipv4Addr::new(10, 8, 0, 21));
    }

    fn output(name: &str, ip: &str) -> NodeOutput {
        NodeOutput {
            name: name.to_string(),
            provider: CloudProvider::DigitalOcean,
            region: "nyc3".to_string(),
            size: "s-2vcpu-4gb".to_string(),
            public_ip: ip.to_string(),
            private_ip: None,
            overlay_ip: None,
            ssh_user: "root".to_string(),
            labels: Map::new(),
            status: NodeStatus::Running,
        }
    }

    #[test]
    fn every_node_sees_n_minus_one_peers_with_distinct_overlay_allowed_ips() {
        let specs = vec![
            spec("m1", vec![NodeRole::Master]),
            spec("m2", vec![NodeRole::Master]),
            spec("w1", vec![NodeRole::Worker]),
        ];
        let nodes = vec![
            output("m1", "203.0.113.1"),
            output("m2", "203.0.113.2"),
            output("w1", "203.0.113.3"),
        ];
        let keypairs: Map<String, Keypair> = nodes
            .iter()
            .map(|n| (n.name.clone(), crate::generate_keypair()))
            .collect();
        let plan = build_mesh_plan(&nodes, &specs, &keypairs, Ipv4Addr::new(10, 8, 0, 0), 51820, 25)
            .unwrap();

        for cfg in &plan.configs {
            assert_eq!(cfg.peers.len(), nodes.len() - 1);
            let allowed: std::collections::HashSet<_> =
                cfg.peers.iter().map(|p| p.allowed_ips.clone()).collect();
            assert_eq!(allowed.len(), cfg.peers.len());
        }
        let ips: std::collections::HashSet<_> = plan.overlay_ips.values().collect();
        assert_eq!(ips.len(), nodes.len());
    }

    #[test]
    fn missing_public_ip_is_reported() {
        let specs = vec![spec("m1", vec![NodeRole::Master]), spec("m2", vec![NodeRole::Master])];
        let nodes = vec![output("m1", "203.0.113.1"), output("m2", "")];
        let keypairs: Map<String, Keypair> = nodes
            .iter()
            .map(|n| (n.name.clone(), crate::generate_keypair()))
            .collect();
        let err = build_mesh_plan(&nodes, &specs, &keypairs, Ipv4Addr::new(10, 8, 0, 0), 51820, 25)
            .unwrap_err();
        assert!(matches!(err, MeshError::MissingPublicIp(_)));
    }
}
