//! The remote execution driver (component C6): a pluggable transport
//! contract for running idempotent shell scripts against cluster nodes,
//! with bastion-hop support and retry-through-C1 classification.

mod error;
mod fake;
mod retry;

pub use error::ExecError;
pub use fake::FakeExecutor;
pub use retry::RetryingExecutor;

use async_trait::async_trait;

/// One node (or bastion) reachable over SSH.
#[derive(Clone, Debug)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub key_path: String,
    pub bastion: Option<Box<Target>>,
}

impl Target {
    pub fn new(host: impl Into<String>, user: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            key_path: key_path.into(),
            bastion: None,
        }
    }

    pub fn via_bastion(mut self, bastion: Target) -> Self {
        self.bastion = Some(Box::new(bastion));
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The transport contract every vertex's remote command runs through.
/// Implementations MUST tolerate transient connection failures (connection
/// refused, TLS handshake) by classifying them as retryable so
/// `RetryingExecutor` can re-issue them via C1.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, target: &Target, script: &str) -> Result<CommandOutput, ExecError>;

    /// A batch of independent scripts against possibly-different targets.
    /// The default fans out sequentially and accumulates per-script
    /// dispatched/skipped/failed counts the way a bulk dispatch job does.
    async fn execute_batch(
        &self,
        jobs: &[(Target, String)],
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for (target, script) in jobs {
            match self.execute(target, script).await {
                Ok(out) if out.success() => report.dispatched += 1,
                Ok(out) => {
                    report.failed += 1;
                    report.failures.push((target.host.clone(), out.stderr));
                }
                Err(e) => {
                    report.failed += 1;
                    report.failures.push((target.host.clone(), e.to_string()));
                }
            }
        }
        report
    }
}

#[derive(Default, Debug, Clone)]
pub struct BatchReport {
    pub dispatched: u32,
    pub failed: u32,
    pub failures: Vec<(String, String)>,
}
