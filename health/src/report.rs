//! Aggregation across the check battery (§4.8): the overall status is the
//! worst child status; recommendations collect every non-healthy
//! remediation plus one general note when anything is less than healthy.

use fleetwright_exec::{RemoteExecutor, Target};

use crate::check::{Check, CheckResult, CheckStatus, default_battery};

#[derive(Clone, Debug)]
pub struct HealthReport {
    pub overall: CheckStatus,
    pub checks: Vec<CheckResult>,
    pub recommendations: Vec<String>,
}

pub struct HealthChecker {
    battery: Vec<Box<dyn Check>>,
    parallel: bool,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self { battery: default_battery(), parallel: false }
    }

    pub fn with_battery(battery: Vec<Box<dyn Check>>) -> Self {
        Self { battery, parallel: false }
    }

    /// Opts into running the (mutually independent) checks concurrently
    /// rather than the default sequential pass (§5: "MAY parallelize
    /// independent probes").
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub async fn run(&self, executor: &dyn RemoteExecutor, target: &Target) -> HealthReport {
        let results = if self.parallel {
            let futures = self.battery.iter().map(|check| check.run(executor, target));
            futures::future::join_all(futures).await
        } else {
            let mut results = Vec::with_capacity(self.battery.len());
            for check in &self.battery {
                results.push(check.run(executor, target).await);
            }
            results
        };
        aggregate(results)
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn aggregate(checks: Vec<CheckResult>) -> HealthReport {
    let overall = checks.iter().map(|c| c.status).max().unwrap_or(CheckStatus::Unknown);
    let mut recommendations: Vec<String> = checks
        .iter()
        .filter(|c| c.status != CheckStatus::Healthy)
        .filter_map(|c| c.remediation.clone())
        .collect();
    if overall == CheckStatus::Warning || overall == CheckStatus::Critical {
        recommendations.push("review the degraded checks above before the next scheduled maintenance".to_string());
    }
    HealthReport { overall, checks, recommendations }
}
