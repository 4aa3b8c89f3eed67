//! Deterministic first-master election and config-drift detection (§4.5,
//! §9: "cluster-config generation" stability). Grounded on
//! `select_best_replica`'s `min_by_key` tie-break idiom, specialized to a
//! plain lex-min over node names.

use fleetwright_types::NodeSpec;

use crate::error::BootstrapError;

/// The lexicographically first master by name. Deterministic regardless of
/// manifest declaration order (§8 scenario 3: masters `[m3,m1,m2]` elect
/// `m1`).
pub fn elect_first_master(masters: &[NodeSpec]) -> Result<String, BootstrapError> {
    masters
        .iter()
        .map(|m| m.name.clone())
        .min()
        .ok_or(BootstrapError::NoMasters)
}

/// Re-running a bootstrap must not silently re-elect a different first
/// master if the master set's identities changed (e.g. a rename). Compares
/// against the previously recorded election and refuses to proceed on
/// mismatch.
pub fn check_drift(previous_first_master: &str, masters: &[NodeSpec]) -> Result<(), BootstrapError> {
    let current = elect_first_master(masters)?;
    if current != previous_first_master {
        Err(BootstrapError::ConfigDrift {
            expected: previous_first_master.to_string(),
            found: current,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use fleetwright_types::{CloudProvider, NodeRole};

    fn master(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            pool: "masters".to_string(),
            provider: CloudProvider::DigitalOcean,
            size: "s-2vcpu-4gb".to_string(),
            region: "nyc3".to_string(),
            image: "ubuntu".to_string(),
            roles: vec![NodeRole::Master],
            labels: HashMap::new(),
            taints: vec![],
            spot: false,
            zone: None,
        }
    }

    #[test]
    fn scenario_three_election_is_order_independent() {
        let masters = vec![master("m3"), master("m1"), master("m2")];
        assert_eq!(elect_first_master(&masters).unwrap(), "m1");
    }

    #[test]
    fn drift_is_detected_when_first_master_renamed() {
        let masters = vec![master("m2"), master("m3")];
        let err = check_drift("m1", &masters).unwrap_err();
        assert!(matches!(err, BootstrapError::ConfigDrift { .. }));
    }

    #[test]
    fn no_drift_when_election_is_stable() {
        let masters = vec![master("m1"), master("m2")];
        assert!(check_drift("m1", &masters).is_ok());
    }

    #[test]
    fn empty_master_set_is_an_error_not_a_panic() {
        assert!(matches!(elect_first_master(&[]), Err(BootstrapError::NoMasters)));
    }
}
