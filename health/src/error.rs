use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("remote check execution failed: {0}")]
    Remote(String),
}
