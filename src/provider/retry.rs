//! Explicit retry policy for provider calls.
//!
//! The policy is a plain value (attempts, elapsed budget, backoff curve) so
//! that fetch behavior can be tested without a network: hand `run` a closure
//! that fails on a script and assert on the attempt count.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::ProviderError;
use crate::metrics;

/// Exponential-backoff retry policy for transient provider failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts, first try included.
    pub max_attempts: u32,
    /// Total wall-time budget across attempts and backoff sleeps.
    pub max_elapsed: Duration,
    /// Delay before the first retry; doubles per attempt.
    pub initial_backoff: Duration,
    /// Ceiling on a single backoff delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_elapsed: Duration::from_secs(60),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Build the policy from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            max_elapsed: Duration::from_secs(config.retry_max_elapsed_secs),
            initial_backoff: Duration::from_millis(config.retry_initial_backoff_ms),
            ..Self::default()
        }
    }

    /// Run `op` until it succeeds, fails terminally, or the budget runs out.
    ///
    /// Errors whose `is_retryable()` is false are returned immediately with
    /// zero retries. Exhausting the budget returns
    /// [`ProviderError::RetriesExhausted`] wrapping the last failure.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let started = Instant::now();
        let mut delay = self.initial_backoff;
        let mut attempt = 1u32;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    error!(label, attempt, error = %err, "terminal failure, not retrying");
                    return Err(err);
                }
                Err(err) => {
                    let elapsed = started.elapsed();
                    if attempt >= self.max_attempts || elapsed + delay > self.max_elapsed {
                        error!(
                            label,
                            attempt,
                            elapsed_ms = elapsed.as_millis() as u64,
                            error = %err,
                            "retry budget exhausted, giving up"
                        );
                        return Err(ProviderError::RetriesExhausted {
                            attempts: attempt,
                            elapsed,
                            source: Box::new(err),
                        });
                    }

                    warn!(
                        label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    metrics::inc_fetch_retries();
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.max_backoff);
                    attempt += 1;
                }
            }
        }
    }
}
