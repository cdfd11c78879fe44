//! Bounded retry loop.
//!
//! # Responsibilities
//! - Run an operation up to `max_attempts` times, strictly one after another
//! - Wait the configured back-off between attempts
//! - Report exhaustion with the attempt count and the last cause

use std::future::Future;
use std::time::Duration;

use crate::config::InvokeConfig;
use crate::fabric::types::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::resilience::backoff::{calculate_backoff, fixed_backoff};

/// Retry budget and back-off for one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &InvokeConfig) -> Self {
        Self {
            max_attempts: config.retry_count.max(1),
            delay_ms: config.retry_delay_ms,
            max_delay_ms: config.max_delay_ms,
            exponential: config.exponential_backoff,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.exponential {
            calculate_backoff(attempt, self.delay_ms, self.max_delay_ms)
        } else {
            fixed_backoff(attempt, self.delay_ms)
        }
    }

    /// Run `op` until it succeeds or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number. Attempt `k + 1` starts only
    /// after attempt `k` has resolved and the back-off has elapsed.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> GatewayResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    tracing::error!(
                        operation = operation,
                        attempts = attempt,
                        error = %e,
                        "Retry budget exhausted"
                    );
                    return Err(GatewayError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation = operation,
                        attempt = attempt,
                        remaining = self.max_attempts - attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, repeating"
                    );
                    metrics::record_retry(operation);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&InvokeConfig::default())
    }
}
