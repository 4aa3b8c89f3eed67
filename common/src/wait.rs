//! The exponential-backoff retry kernel (component C1).
//!
//! `retry` wraps an idempotent, fallible async operation and re-issues it on
//! error, up to a configured bound, honoring a `CancellationToken` between
//! attempts and during sleeps. `Backoff` exposes the same schedule as a
//! stepwise object for callers that want to drive their own loop (the
//! autoscaling and backup control loops use it directly).

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::CommonError;

const MAX_RETRY_ATTEMPTS: u32 = 50;

/// Tunables for a single retry call site.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, d: Duration) -> Self {
        self.initial_delay = d;
        self
    }

    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }
}

/// Stepwise backoff schedule: call `next()` for each successive delay,
/// `reset()` to start the schedule over after a success.
#[derive(Clone, Debug)]
pub struct Backoff {
    cfg: RetryConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(cfg: RetryConfig) -> Self {
        Self { cfg, attempt: 0 }
    }

    pub fn next(&mut self) -> Duration {
        let delay = delay_for_attempt(&self.cfg, self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// §4.1: "Delay for attempt n is `min(initial*multiplierⁿ, max-delay)`; with
/// jitter, scale by a uniform random factor in [0.5, 1.5]."
fn delay_for_attempt(cfg: &RetryConfig, attempt: u32) -> Duration {
    let base_ms = cfg.initial_delay.as_millis() as u64;
    let cap_ms = cfg.max_delay.as_millis() as u64;
    let pow = cfg.multiplier.powi(attempt as i32);
    let exp_ms = ((base_ms as f64) * pow) as u64;
    let capped = exp_ms.min(cap_ms).max(1) as f64;
    let scaled = if cfg.jitter {
        capped * rand::random_range(0.5..=1.5)
    } else {
        capped
    };
    Duration::from_millis(scaled.round() as u64)
}

/// Runs `op` until it succeeds, `should_retry` declines to retry the latest
/// error, attempts are exhausted, or `cancel` fires. Sleeps between attempts
/// race the cancellation token so a cancelled caller never waits out a full
/// backoff delay.
pub async fn retry<T, E, F, Fut, R>(
    cancel: &CancellationToken,
    cfg: &RetryConfig,
    should_retry: R,
    mut op: F,
) -> Result<T, CommonError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let mut backoff = Backoff::new(cfg.clone());
    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(CommonError::Cancelled { last: None });
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempts += 1;
                if attempts > cfg.max_attempts.min(MAX_RETRY_ATTEMPTS) || !should_retry(&err) {
                    return Err(CommonError::Exhausted(err));
                }
                let delay = backoff.next();
                tracing::warn!(attempt = attempts, delay_ms = delay.as_millis() as u64, "retrying");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(CommonError::Cancelled { last: Some(err) }),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// Cancellation-aware sleep used by control loops between ticks.
pub async fn wait(cancel: &CancellationToken, delay: Duration) -> Result<(), CommonError<std::convert::Infallible>> {
    tokio::select! {
        _ = cancel.cancelled() => Err(CommonError::Cancelled { last: None }),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_respects_cap() {
        let cfg = RetryConfig::default()
            .jitter(false)
            .max_delay(Duration::from_millis(1000));
        let mut b = Backoff::new(cfg);
        let delays: Vec<_> = (0..8).map(|_| b.next()).collect();
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(1000)));
        assert!(delays[5] == Duration::from_millis(1000));
    }

    #[test]
    fn reset_restarts_schedule() {
        let cfg = RetryConfig::default().jitter(false);
        let mut b = Backoff::new(cfg);
        let first = b.next();
        b.next();
        b.reset();
        assert_eq!(b.next(), first);
    }

    #[tokio::test]
    async fn retry_stops_after_max_attempts() {
        let cancel = CancellationToken::new();
        let cfg = RetryConfig::default()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(2));
        let calls = AtomicU32::new(0);
        let result: Result<(), CommonError<&str>> = retry(
            &cancel,
            &cfg,
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            },
        )
        .await;
        assert!(matches!(result, Err(CommonError::Exhausted("boom"))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn retry_returns_cancelled_when_context_cancelled_up_front() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let cfg = RetryConfig::default();
        let result: Result<(), CommonError<&str>> =
            retry(&cancel, &cfg, |_| true, || async { Err("boom") }).await;
        match result {
            Err(CommonError::Cancelled { last }) => assert_eq!(last, None),
            other => panic!("expected Cancelled with no prior attempt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scenario_six_retry_is_cancelled_mid_sleep_after_exactly_one_attempt() {
        let cancel = CancellationToken::new();
        let cfg = RetryConfig::default()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(10))
            .jitter(false);
        let calls = AtomicU32::new(0);

        let cancel_trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<(), CommonError<&str>> = retry(
            &cancel,
            &cfg,
            |_| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            },
        )
        .await;
        let elapsed = started.elapsed();

        match result {
            Err(CommonError::Cancelled { last }) => assert_eq!(last, Some("boom")),
            other => panic!("expected Cancelled wrapping the last error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(elapsed < Duration::from_millis(150), "elapsed was {elapsed:?}");
    }
}
