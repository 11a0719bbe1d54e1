//! Retry policy with exponential backoff
//!
//! Bounded retry strategy:
//! - Attempts: 1 + max_retries (default 3)
//! - Delay: base × 2^(retry-1), capped, ±25% jitter
//! - Only errors with [`RagError::is_retryable`] are retried

use crate::config::ExecutorConfig;
use crate::errors::RagError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Final failure after all attempts
#[derive(Debug)]
pub struct RetryError {
    /// Attempts actually made
    pub attempts: u32,
    pub last_error: RagError,
}

/// Retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    max_retries: u32,

    /// Base delay in milliseconds
    base_delay_ms: u64,

    /// Maximum delay cap in milliseconds
    max_delay_ms: u64,

    /// Enable jitter
    enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            enable_jitter: config.jitter,
        }
    }

    /// Execute operation with retry logic
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> std::result::Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = crate::errors::Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() || attempt >= self.max_attempts() {
                        return Err(RetryError {
                            attempts: attempt,
                            last_error: e,
                        });
                    }

                    let delay = self.calculate_delay(attempt);
                    debug!(
                        attempt,
                        max_attempts = self.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Delay before retry number `retry` (1-based)
    fn calculate_delay(&self, retry: u32) -> Duration {
        let exponential_delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(retry.saturating_sub(1)));

        let delay_ms = exponential_delay.min(self.max_delay_ms);

        // ±25% random variation
        let final_delay = if self.enable_jitter {
            let jitter = (delay_ms / 4) as f64;
            let random_jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter;
            ((delay_ms as f64) + random_jitter).max(0.0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Upper bound on time spent sleeping between attempts (without jitter)
    pub fn max_total_wait_time(&self) -> Duration {
        let total_ms = (1..=self.max_retries)
            .map(|retry| {
                self.base_delay_ms
                    .saturating_mul(2u64.saturating_pow(retry - 1))
                    .min(self.max_delay_ms)
            })
            .sum();

        Duration::from_millis(total_ms)
    }
}
