//! Composes the circuit breaker and the retry policy into one
//! "guarded call" layer, the way §4.3/§4.7 specify the executor and
//! gateway should wrap every outbound invocation.

use std::future::Future;

use contracts::RouterError;

use crate::circuit_breaker::{Admission, CircuitBreaker};
use crate::retry::{retry, RetryConfig};

/// Runs `operation` behind `breaker`, retrying transient failures per
/// `retry_config`. Each individual attempt still consults the breaker
/// (a half-open probe is consumed by the first attempt only; retries
/// after a probe failure see the breaker reopen and reject).
pub async fn call_guarded<F, Fut, T>(
    breaker: &CircuitBreaker,
    retry_config: &RetryConfig,
    mut operation: F,
) -> Result<T, RouterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RouterError>>,
{
    retry(retry_config, |_attempt| {
        let admission = breaker.admit();
        let fut = operation();
        async move {
            match admission {
                Admission::Reject => Err(RouterError::BreakerOpen {
                    target: breaker.name().to_string(),
                }),
                Admission::Pass | Admission::Probe => match fut.await {
                    Ok(value) => {
                        breaker.record_success();
                        Ok(value)
                    }
                    Err(err) => {
                        breaker.record_failure();
                        Err(err)
                    }
                },
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn breaker_open_short_circuits_without_retrying() {
        let breaker = CircuitBreaker::new(
            "weather",
            CircuitBreakerConfig {
                threshold: 1,
                cooldown_ms: 60_000,
            },
        );
        breaker.record_failure();
        let calls = Arc::new(AtomicU32::new(0));
        let retry_config = RetryConfig {
            max_attempts: 3,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
            jitter_ms: 0,
        };
        let result: Result<i32, RouterError> = call_guarded(&breaker, &retry_config, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
        })
        .await;
        assert!(matches!(result, Err(RouterError::BreakerOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_closes_breaker_after_half_open_probe() {
        let breaker = CircuitBreaker::new(
            "weather",
            CircuitBreakerConfig {
                threshold: 1,
                cooldown_ms: 0,
            },
        );
        breaker.record_failure();
        let retry_config = RetryConfig::default();
        let result: Result<i32, RouterError> =
            call_guarded(&breaker, &retry_config, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(
            breaker.snapshot().status,
            contracts::CircuitStatus::Closed
        );
    }
}
