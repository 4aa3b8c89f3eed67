use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("connection to {0} refused")]
    ConnectionRefused(String),

    #[error("tls handshake with {0} failed")]
    TlsHandshake(String),

    #[error("remote command on {host} exited {exit_code}: {stderr}")]
    NonZeroExit {
        host: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ExecError {
    /// Classification helper the retry kernel consults (§4.6): connection
    /// refused and TLS handshake failures are transient, everything else is
    /// surfaced as a `RemoteExecError` immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecError::ConnectionRefused(_) | ExecError::TlsHandshake(_))
    }
}
