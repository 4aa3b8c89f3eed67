use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("no masters in the manifest to elect a first master from")]
    NoMasters,

    #[error("config drift: first master was '{expected}', now resolves to '{found}'")]
    ConfigDrift { expected: String, found: String },

    #[error("readiness check for '{node}' did not pass within {budget_secs}s")]
    Timeout {
        node: String,
        budget_secs: u64,
        last_log: String,
    },

    #[error("remote execution failed: {0}")]
    Remote(String),

    #[error("node '{0}' has no overlay IP yet; the mesh must be ready before bootstrap runs")]
    MissingOverlayIp(String),

    #[error("cancelled")]
    Cancelled,
}
