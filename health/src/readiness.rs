//! A `/healthz`-equivalent readiness probe shape (§4.8), grounded on the
//! sibling storage service's health-check HTTP proxy: this crate supplies
//! the "ask the cluster, report OK/unhealthy" logic only. Binding an actual
//! socket belongs to the out-of-scope daemon/CLI surface; a caller wires
//! `is_ready` behind whatever transport it wants.

use fleetwright_exec::{RemoteExecutor, Target};

use crate::check::CheckStatus;
use crate::report::HealthChecker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ok,
    Unhealthy,
}

/// `Warning` still counts as ready (a degraded-but-serving cluster); only
/// `Critical`/`Unknown` fail the probe.
pub async fn is_ready(checker: &HealthChecker, executor: &dyn RemoteExecutor, target: &Target) -> Readiness {
    let report = checker.run(executor, target).await;
    match report.overall {
        CheckStatus::Healthy | CheckStatus::Warning => Readiness::Ok,
        CheckStatus::Unknown | CheckStatus::Critical => Readiness::Unhealthy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwright_exec::FakeExecutor;

    #[tokio::test]
    async fn a_warning_battery_still_reports_ready() {
        let executor = FakeExecutor::new(Box::new(|_, script| {
            if script.contains("kube-dns") {
                Ok(fleetwright_exec::CommandOutput {
                    stdout: "coredns-1 Pending".to_string(),
                    stderr: String::new(),
                    exit_code: 0,
                })
            } else {
                Ok(fleetwright_exec::CommandOutput::default())
            }
        }));
        let target = Target::new("10.8.0.10", "root", "id_rsa");
        let readiness = is_ready(&HealthChecker::new(), &executor, &target).await;
        assert_eq!(readiness, Readiness::Ok);
    }

    #[tokio::test]
    async fn a_critical_battery_reports_unhealthy() {
        let executor = FakeExecutor::new(Box::new(|_, script| {
            if script.contains("kube-dns") {
                Ok(fleetwright_exec::CommandOutput {
                    stdout: "coredns-1 0/1 CrashLoopBackOff".to_string(),
                    stderr: String::new(),
                    exit_code: 0,
                })
            } else {
                Ok(fleetwright_exec::CommandOutput::default())
            }
        }));
        let target = Target::new("10.8.0.10", "root", "id_rsa");
        let readiness = is_ready(&HealthChecker::new(), &executor, &target).await;
        assert_eq!(readiness, Readiness::Unhealthy);
    }
}
