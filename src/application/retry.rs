use crate::config::RetryConfig;
use crate::error::{CommissionError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Runs `operation` under bounded exponential backoff.
///
/// Only retryable failures (upstream timeouts, adapter I/O) are retried;
/// validation and conflict errors return immediately, since trying again
/// cannot change the answer.
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay();

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if !error.is_retryable() => return Err(error),
            Err(error) => {
                if attempt >= config.max_attempts {
                    tracing::error!(attempt, error = %error, "giving up after final attempt");
                    return Err(error);
                }
                tracing::warn!(
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis(),
                    "retryable failure, backing off"
                );
                sleep(delay).await;
                delay = Duration::from_millis(
                    ((delay.as_millis() as f64) * config.multiplier) as u64,
                )
                .min(config.max_delay());
            }
        }
    }
}
