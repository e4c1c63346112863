use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::core::errors::ProviderError;

/// Exponential backoff for provider calls. Attempt `n` (1-based) of a retry
/// waits `initial_delay * factor^(n-1)` before running.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        self.initial_delay.mul_f64(self.factor.powi(exponent))
    }
}

#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, ProviderError>,
    pub attempts: u32,
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are spent. Only [`ProviderError::is_retryable`]
/// failures are retried.
pub async fn retry_provider_call<F, Fut, T>(
    policy: &RetryPolicy,
    provider: &str,
    endpoint: &str,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    info!(
                        "{} {} succeeded after {} attempts",
                        provider, endpoint, attempts
                    );
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts,
                };
            }
            Err(err) if err.is_retryable() && attempts < max_attempts => {
                let delay = policy.delay_before_retry(attempts);
                warn!(
                    "{} {} failed (attempt {}/{}): {}. Retrying in {:?}",
                    provider, endpoint, attempts, max_attempts, err, delay
                );
                sleep(delay).await;
            }
            Err(err) => {
                return RetryOutcome {
                    result: Err(err),
                    attempts,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn server_error() -> ProviderError {
        ProviderError::Api {
            provider: "p".into(),
            status: 503,
            message: "unavailable".into(),
        }
    }

    #[test]
    fn delays_double_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before_retry(1), Duration::from_secs(1));
        assert_eq!(policy.delay_before_retry(2), Duration::from_secs(2));
        assert_eq!(policy.delay_before_retry(3), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = Instant::now();
        let outcome: RetryOutcome<()> =
            retry_provider_call(&RetryPolicy::default(), "p", "/x", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            })
            .await;

        assert_eq!(outcome.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.result.unwrap_err(), server_error());
        assert!(started.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_errors_return_immediately() {
        let started = Instant::now();
        let outcome: RetryOutcome<()> =
            retry_provider_call(&RetryPolicy::default(), "p", "/x", || async {
                Err(ProviderError::Malformed {
                    provider: "p".into(),
                    message: "not json".into(),
                })
            })
            .await;
        assert_eq!(outcome.attempts, 1);
        assert!(started.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test]
    async fn zero_attempt_policy_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let outcome = retry_provider_call(&policy, "p", "/x", || async { Ok(5) }).await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result.unwrap(), 5);
    }
}
