//! An in-process executor used by reconciler/bootstrap tests in place of a
//! real SSH transport. Scripts are matched by a caller-supplied responder so
//! tests can simulate idempotent state-file checks, readiness polling, and
//! transient failures without a network.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::{CommandOutput, RemoteExecutor, Target};

pub type Responder = Box<dyn Fn(&Target, &str) -> Result<CommandOutput, ExecError> + Send + Sync>;

pub struct FakeExecutor {
    responder: Responder,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeExecutor {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always succeeds with empty output; useful when a test only cares
    /// about call counts and ordering.
    pub fn always_ok() -> Self {
        Self::new(Box::new(|_, _| Ok(CommandOutput::default())))
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("fake executor lock").clone()
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn execute(&self, target: &Target, script: &str) -> Result<CommandOutput, ExecError> {
        self.calls
            .lock()
            .expect("fake executor lock")
            .push((target.host.clone(), script.to_string()));
        (self.responder)(target, script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_every_call_in_order() {
        let exec = FakeExecutor::always_ok();
        exec.execute(&Target::new("10.8.0.10", "root", "id_rsa"), "echo hi")
            .await
            .unwrap();
        exec.execute(&Target::new("10.8.0.11", "root", "id_rsa"), "echo bye")
            .await
            .unwrap();
        assert_eq!(
            exec.calls(),
            vec![
                ("10.8.0.10".to_string(), "echo hi".to_string()),
                ("10.8.0.11".to_string(), "echo bye".to_string()),
            ]
        );
    }
}
