use thiserror::Error;

/// Error kinds a `Provider` driver may surface (§7). `Transient` is the only
/// variant the retry kernel treats as eligible for re-issue.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("missing required config field(s): {0}")]
    Config(String),

    #[error("credentials rejected: {0}")]
    Credential(String),

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("{0} is not supported by this provider")]
    Unsupported(&'static str),

    #[error("provider operation failed: {0}")]
    Other(String),
}

impl ProviderError {
    /// Classification helper for the retry kernel (§4.1): only
    /// rate-limits/5xx/connection-reset style failures are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}
