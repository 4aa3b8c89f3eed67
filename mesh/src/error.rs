use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("overlay subnet '{0}' exhausted: {1} nodes requested")]
    SubnetExhausted(String, usize),

    #[error("node '{0}' has no public IP to build a peer endpoint from")]
    MissingPublicIp(String),

    #[error("node '{0}' established no peer within the reachability window")]
    Unreachable(String),

    #[error("coordinator mesh requires a server URL and namespace")]
    CoordinatorConfigMissing,

    #[error("remote execution failed while programming the mesh: {0}")]
    Remote(String),
}
