use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutoscaleError {
    #[error("autoscaler is already running for this cluster")]
    AlreadyRunning,

    #[error("node scaler failed: {0}")]
    Scaler(String),

    #[error("cancelled")]
    Cancelled,
}
