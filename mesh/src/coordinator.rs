//! The coordinator-based mesh alternative (§4.4): a central sign-in server
//! issues a preauth key per node and distributes peer membership itself,
//! skipping the full pairwise peer program step.

use fleetwright_exec::{RemoteExecutor, Target};

use crate::error::MeshError;

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub server_url: String,
    pub namespace: String,
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.server_url.trim().is_empty() || self.namespace.trim().is_empty() {
            return Err(MeshError::CoordinatorConfigMissing);
        }
        Ok(())
    }
}

/// Joins one node to the coordinator-managed mesh using a preauth key. The
/// node's own peer programming is then owned by the coordinator rather than
/// by this engine, so there is no pairwise peer list to build here.
pub async fn program_coordinator_mesh(
    executor: &dyn RemoteExecutor,
    target: &Target,
    cfg: &CoordinatorConfig,
    preauth_key: &str,
) -> Result<(), MeshError> {
    cfg.validate()?;
    let script = format!(
        "tailscale up --login-server={} --authkey={} --accept-routes",
        cfg.server_url, preauth_key
    );
    let _ = cfg.namespace;
    executor
        .execute(target, &script)
        .await
        .map_err(|e| MeshError::Remote(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwright_exec::FakeExecutor;

    #[test]
    fn missing_server_or_namespace_is_rejected() {
        let cfg = CoordinatorConfig {
            server_url: String::new(),
            namespace: "prod".to_string(),
        };
        assert!(matches!(cfg.validate(), Err(MeshError::CoordinatorConfigMissing)));
    }

    #[tokio::test]
    async fn valid_config_programs_the_node() {
        let cfg = CoordinatorConfig {
            server_url: "https://coordinator.internal".to_string(),
            namespace: "prod".to_string(),
        };
        let executor = FakeExecutor::always_ok();
        let target = Target::new("10.8.0.10", "root", "id_rsa");
        let result = program_coordinator_mesh(&executor, &target, &cfg, "preauth-abc").await;
        assert!(result.is_ok());
    }
}
