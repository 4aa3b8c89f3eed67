//! Ambient stack shared by every crate in the workspace: the retry/backoff
//! kernel (C1), the event bus (C12), engine configuration, shutdown-signal
//! handling, metrics, and the cross-crate `Cancelled` error.

pub mod args;
pub mod error;
pub mod events;
pub mod metrics;
pub mod shutdown;
pub mod wait;

pub use error::CommonError;
pub use events::EventEmitter;
pub use wait::{Backoff, RetryConfig};

/// Initializes the `tracing` subscriber from `RUST_LOG` (default `info`).
/// Call once, at the top of a binary's `main`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
