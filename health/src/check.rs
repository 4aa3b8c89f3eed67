//! The fixed check battery (§4.8): Nodes, SystemPods, CoreDNS, Certificates,
//! Etcd, APIServer, Storage, Networking, MemoryPressure, DiskPressure.
//! Every check is an idempotent read-only remote command whose output is
//! classified into a `CheckStatus`.

use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use fleetwright_exec::{RemoteExecutor, Target};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckStatus {
    Healthy,
    Unknown,
    Warning,
    Critical,
}

#[derive(Clone, Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub details: Vec<String>,
    pub duration: Duration,
    pub remediation: Option<String>,
}

#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, executor: &dyn RemoteExecutor, target: &Target) -> CheckResult;
}

/// A check expressed as one remote script classified by substring markers in
/// its combined stdout+stderr. Covers every battery member: the markers
/// differ, the evaluation shape does not.
pub struct ScriptCheck {
    pub name: &'static str,
    pub script: &'static str,
    pub critical_markers: &'static [&'static str],
    pub warning_markers: &'static [&'static str],
    pub remediation: &'static str,
}

#[async_trait]
impl Check for ScriptCheck {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, executor: &dyn RemoteExecutor, target: &Target) -> CheckResult {
        let start = Instant::now();
        let outcome = executor.execute(target, self.script).await;
        let duration = start.elapsed();

        match outcome {
            Err(e) => CheckResult {
                name: self.name.to_string(),
                status: CheckStatus::Unknown,
                message: format!("check could not run: {e}"),
                details: vec![],
                duration,
                remediation: Some(self.remediation.to_string()),
            },
            Ok(out) => {
                let combined = format!("{}\n{}", out.stdout, out.stderr);
                let details: Vec<String> = combined.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect();

                if !out.success() || self.critical_markers.iter().any(|m| combined.contains(m)) {
                    CheckResult {
                        name: self.name.to_string(),
                        status: CheckStatus::Critical,
                        message: format!("{} reported a critical condition", self.name),
                        details,
                        duration,
                        remediation: Some(self.remediation.to_string()),
                    }
                } else if self.warning_markers.iter().any(|m| combined.contains(m)) {
                    CheckResult {
                        name: self.name.to_string(),
                        status: CheckStatus::Warning,
                        message: format!("{} reported a degraded condition", self.name),
                        details,
                        duration,
                        remediation: Some(self.remediation.to_string()),
                    }
                } else {
                    CheckResult {
                        name: self.name.to_string(),
                        status: CheckStatus::Healthy,
                        message: format!("{} is healthy", self.name),
                        details,
                        duration,
                        remediation: None,
                    }
                }
            }
        }
    }
}

/// The ten checks §4.8 names, in the fixed order the spec lists them.
pub fn default_battery() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(ScriptCheck {
            name: "Nodes",
            script: "kubectl get nodes --no-headers",
            critical_markers: &["NotReady"],
            warning_markers: &["SchedulingDisabled"],
            remediation: "investigate node kubelet status; consider cordoning and draining unhealthy nodes",
        }),
        Box::new(ScriptCheck {
            name: "SystemPods",
            script: "kubectl get pods -n kube-system --no-headers",
            critical_markers: &["CrashLoopBackOff", "Error"],
            warning_markers: &["Pending", "ContainerCreating"],
            remediation: "describe the affected kube-system pods for scheduling or image-pull failures",
        }),
        Box::new(ScriptCheck {
            name: "CoreDNS",
            script: "kubectl get pods -n kube-system -l k8s-app=kube-dns --no-headers",
            critical_markers: &["CrashLoopBackOff", "0/1"],
            warning_markers: &["Pending"],
            remediation: "restart the CoreDNS deployment; verify cluster DNS resolution",
        }),
        Box::new(ScriptCheck {
            name: "Certificates",
            script: "rke2 certificate check",
            critical_markers: &["expired"],
            warning_markers: &["expires soon"],
            remediation: "rotate the cluster's RKE2-managed certificates",
        }),
        Box::new(ScriptCheck {
            name: "Etcd",
            script: "rke2 etcd-snapshot list",
            critical_markers: &["connection refused", "unhealthy"],
            warning_markers: &["slow"],
            remediation: "inspect etcd member health and disk latency on the masters",
        }),
        Box::new(ScriptCheck {
            name: "APIServer",
            script: "kubectl get --raw=/healthz",
            critical_markers: &["unhealthy"],
            warning_markers: &[],
            remediation: "check kube-apiserver logs on every master",
        }),
        Box::new(ScriptCheck {
            name: "Storage",
            script: "kubectl get pv --no-headers",
            critical_markers: &["Failed"],
            warning_markers: &["Pending", "Released"],
            remediation: "reclaim or recreate the affected PersistentVolumes",
        }),
        Box::new(ScriptCheck {
            name: "Networking",
            script: "kubectl get pods -n kube-system -l k8s-app=canal --no-headers",
            critical_markers: &["CrashLoopBackOff"],
            warning_markers: &["Pending"],
            remediation: "inspect the CNI daemonset and overlay network connectivity",
        }),
        Box::new(ScriptCheck {
            name: "MemoryPressure",
            script: "kubectl get nodes -o jsonpath={.items[*].status.conditions[?(@.type==\"MemoryPressure\")].status}",
            critical_markers: &[],
            warning_markers: &["True"],
            remediation: "scale up or evict low-priority workloads on nodes under memory pressure",
        }),
        Box::new(ScriptCheck {
            name: "DiskPressure",
            script: "kubectl get nodes -o jsonpath={.items[*].status.conditions[?(@.type==\"DiskPressure\")].status}",
            critical_markers: &[],
            warning_markers: &["True"],
            remediation: "free or expand disk space on nodes under disk pressure",
        }),
    ]
}
