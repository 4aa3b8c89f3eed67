//! Error kinds shared across every crate (§7). Leaf crates define their own
//! `thiserror` enum for domain-specific failures and reuse `Cancelled` from
//! here so a cancelled retry loop always surfaces the same shape regardless
//! of which component was running it.

use thiserror::Error;

/// Wraps a retried operation's outcome: either the context was cancelled, or
/// every attempt was exhausted and the last underlying error is carried.
///
/// `Cancelled` itself wraps the last error observed before cancellation
/// (§4.1: "returning a cancellation error wrapping the last error"), or
/// `None` when the context was already cancelled before any attempt ran.
#[derive(Debug, Error)]
pub enum CommonError<E: std::fmt::Debug + std::fmt::Display> {
    #[error("operation cancelled (last error: {last:?})")]
    Cancelled { last: Option<E> },
    #[error("retries exhausted: {0}")]
    Exhausted(E),
}
