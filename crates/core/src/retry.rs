//! Bounded exponential-backoff retries for transient failures.
//!
//! Used around hosting-service calls (repository creation, pushes). Agent
//! invocations are never retried here: they are expensive and
//! non-idempotent, so retry policy for them belongs to the caller.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Reusable retry policy.
///
/// `max_retries` counts retries, not attempts: a permanently failing
/// operation is invoked `max_retries + 1` times. The k-th sleep before a
/// retry is `min(base_delay * backoff_factor^(k-1), max_delay)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    /// Delay slept before the `retry`-th retry (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Invoke `op`, retrying while `is_transient` classifies the failure as
    /// retryable and the retry budget lasts.
    ///
    /// Non-transient failures propagate immediately without a delay. A
    /// success at any attempt returns immediately; no delay follows success.
    pub async fn run<T, E, F, Fut>(
        &self,
        is_transient: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt <= self.max_retries && is_transient(&err) => {
                    let delay = self.delay_before_retry(attempt);
                    debug!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "transient failure, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if attempt > self.max_retries && is_transient(&err) {
                        warn!(retries = self.max_retries, error = %err, "retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// Single-call form with the default policy.
pub async fn call_with_retry<T, E, F, Fut>(
    is_transient: impl Fn(&E) -> bool,
    op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryPolicy::default().run(is_transient, op).await
}
