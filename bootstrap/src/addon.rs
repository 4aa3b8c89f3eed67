//! The optional addon phase (§4.5), run after `ClusterReady`: install Helm,
//! add common repositories, deploy monitoring when enabled. Failures here
//! are logged and reported but never fail the cluster bootstrap itself.

use fleetwright_exec::{RemoteExecutor, Target};

#[derive(Clone, Debug)]
pub struct AddonReport {
    pub helm_installed: bool,
    pub repos_added: Vec<String>,
    pub monitoring_deployed: bool,
    pub failures: Vec<String>,
}

const COMMON_REPOS: &[(&str, &str)] = &[
    ("prometheus-community", "https://prometheus-community.github.io/helm-charts"),
    ("grafana", "https://grafana.github.io/helm-charts"),
];

/// Installs Helm, adds the common repositories, and deploys the monitoring
/// stack if `monitoring_enabled`. Every step is independent: one failing
/// does not prevent the rest from being attempted.
pub async fn install_addons(
    executor: &dyn RemoteExecutor,
    control_target: &Target,
    monitoring_enabled: bool,
) -> AddonReport {
    let mut report = AddonReport {
        helm_installed: false,
        repos_added: Vec::new(),
        monitoring_deployed: false,
        failures: Vec::new(),
    };

    match executor
        .execute(control_target, "curl -sfL https://get.helm.sh/install.sh | bash")
        .await
    {
        Ok(out) if out.success() => report.helm_installed = true,
        Ok(out) => report.failures.push(format!("helm install: {}", out.stderr)),
        Err(e) => report.failures.push(format!("helm install: {e}")),
    }

    for (name, url) in COMMON_REPOS {
        let script = format!("helm repo add {name} {url} && helm repo update");
        match executor.execute(control_target, &script).await {
            Ok(out) if out.success() => report.repos_added.push(name.to_string()),
            Ok(out) => report.failures.push(format!("repo {name}: {}", out.stderr)),
            Err(e) => report.failures.push(format!("repo {name}: {e}")),
        }
    }

    if monitoring_enabled {
        let script = "helm upgrade --install kube-prometheus-stack prometheus-community/kube-prometheus-stack --namespace monitoring --create-namespace";
        match executor.execute(control_target, script).await {
            Ok(out) if out.success() => report.monitoring_deployed = true,
            Ok(out) => report.failures.push(format!("monitoring: {}", out.stderr)),
            Err(e) => report.failures.push(format!("monitoring: {e}")),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwright_exec::{CommandOutput, FakeExecutor};

    #[tokio::test]
    async fn monitoring_is_skipped_when_disabled() {
        let executor = FakeExecutor::always_ok();
        let target = Target::new("10.8.0.10", "root", "id_rsa");
        let report = install_addons(&executor, &target, false).await;
        assert!(report.helm_installed);
        assert_eq!(report.repos_added.len(), 2);
        assert!(!report.monitoring_deployed);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn a_failed_repo_add_does_not_block_monitoring_deploy() {
        let executor = FakeExecutor::new(Box::new(|_, script| {
            if script.contains("grafana") {
                Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: "network unreachable".to_string(),
                    exit_code: 1,
                })
            } else {
                Ok(CommandOutput::default())
            }
        }));
        let target = Target::new("10.8.0.10", "root", "id_rsa");
        let report = install_addons(&executor, &target, true).await;
        assert!(report.monitoring_deployed);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].contains("grafana"));
    }
}
