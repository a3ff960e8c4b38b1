//! Bounded retry with exponential backoff and jitter.
//!
//! Wraps the circuit breaker: only `transient` errors are retried: a
//! `BreakerOpen` that hasn't cleared its cooldown is not retried
//! within the same call, it simply fails the attempt.

use std::future::Future;

use contracts::RouterError;
use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 200,
            max_backoff_ms: 5_000,
            jitter_ms: 100,
        }
    }
}

impl RetryConfig {
    fn backoff_for(&self, attempt: u32) -> u64 {
        let exp = self
            .base_backoff_ms
            .saturating_mul(1u64 << attempt.min(16).saturating_sub(1).max(0));
        let capped = exp.min(self.max_backoff_ms);
        if self.jitter_ms == 0 {
            capped
        } else {
            capped + rand::thread_rng().gen_range(0..=self.jitter_ms)
        }
    }
}

/// Runs `operation` under the given retry policy. `operation` is
/// re-invoked for each attempt; it is the caller's responsibility to
/// have already consulted a `CircuitBreaker::admit()` before the
/// first call (see [`crate::guard::Guard`]).
pub async fn retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T, RouterError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RouterError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < config.max_attempts => {
                let delay = config.backoff_for(attempt);
                warn!(attempt, delay_ms = delay, error = %err, "retrying after transient failure");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_without_retry() {
        let config = RetryConfig::default();
        let result: Result<i32, RouterError> = retry(&config, |_attempt| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let config = RetryConfig {
            max_attempts: 3,
            base_backoff_ms: 1,
            max_backoff_ms: 5,
            jitter_ms: 0,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<i32, RouterError> = retry(&config, |_attempt| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(RouterError::Transient {
                        target: "weather".into(),
                        cause: "timeout".into(),
                    })
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<i32, RouterError> = retry(&config, |_attempt| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RouterError::Permanent {
                    target: "weather".into(),
                    cause: "401".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let config = RetryConfig {
            max_attempts: 2,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
            jitter_ms: 0,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<i32, RouterError> = retry(&config, |_attempt| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RouterError::Transient {
                    target: "weather".into(),
                    cause: "timeout".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
