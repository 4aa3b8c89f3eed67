//! Manifest invariant checks (§3), run fail-fast before anything is
//! registered or reconciled (§7: `ConfigError` is "missing/invalid fields
//! ... fail-fast at register time").

use std::net::Ipv4Addr;

use fleetwright_types::ClusterManifest;

use crate::error::EngineError;

fn parse_cidr(cidr: &str) -> Result<(u32, u32), String> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("'{cidr}' is not a CIDR (missing '/')"))?;
    let ip: Ipv4Addr = addr.parse().map_err(|_| format!("'{cidr}' has an invalid address"))?;
    let prefix: u32 = prefix.parse().map_err(|_| format!("'{cidr}' has an invalid prefix"))?;
    if prefix > 32 {
        return Err(format!("'{cidr}' has an out-of-range prefix"));
    }
    let mask: u32 = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    let network = u32::from(ip) & mask;
    Ok((network, mask))
}

fn cidrs_disjoint(a: &str, b: &str) -> Result<bool, String> {
    let (net_a, mask_a) = parse_cidr(a)?;
    let (net_b, mask_b) = parse_cidr(b)?;
    let mask = mask_a.min(mask_b);
    Ok((net_a & mask) != (net_b & mask))
}

/// Validates the manifest-level invariants from §3. Pool-level role
/// recognition is enforced structurally by `NodeRole` being a closed enum;
/// what remains to check here is that every pool's provider is actually
/// enabled and that CIDRs are well-formed and disjoint.
pub fn validate_manifest(manifest: &ClusterManifest) -> Result<(), EngineError> {
    let mut problems = Vec::new();

    if manifest.name.trim().is_empty() {
        problems.push("cluster name must not be empty".to_string());
    }

    if !manifest.providers.iter().any(|p| p.enabled) {
        problems.push("at least one provider must be enabled".to_string());
    }

    match cidrs_disjoint(&manifest.network.pod_cidr, &manifest.network.service_cidr) {
        Ok(true) => {}
        Ok(false) => problems.push(format!(
            "pod CIDR '{}' and service CIDR '{}' overlap",
            manifest.network.pod_cidr, manifest.network.service_cidr
        )),
        Err(e) => problems.push(e),
    }

    for (name, pool) in &manifest.node_pools {
        let provider_enabled = manifest
            .providers
            .iter()
            .any(|p| p.provider == pool.provider && p.enabled);
        if !provider_enabled {
            problems.push(format!("pool '{name}': provider '{}' is not enabled", pool.provider));
        }
        let autoscaling = pool.min.is_some() || pool.max.is_some();
        if pool.count < 1 && !autoscaling {
            problems.push(format!("pool '{name}': count must be >= 1 unless autoscaling is configured"));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Config(problems.join("; ")))
    }
}
