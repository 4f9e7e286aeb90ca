//! Bounded retry of rate-limited platform calls

use std::future::Future;
use std::time::Duration;

use crate::ports::SendError;

/// Retry settings shared by every sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay multiplied by the attempt number when no hint is given
    pub base_delay: Duration,
    /// Upper bound on any single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits, for tests and dry runs
    pub fn immediate() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Wait before the attempt following `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after.unwrap_or_else(|| self.base_delay.saturating_mul(attempt));
        delay.min(self.max_delay)
    }

    /// Run `call`, retrying only [`SendError::RateLimited`] failures
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, SendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SendError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(SendError::RateLimited(retry_after)) if attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt, retry_after);
                    tracing::warn!(
                        operation = %operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_secs = delay.as_secs(),
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_prefers_hint_and_caps() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(1, None), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(10));
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(17))),
            Duration::from_secs(17)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limit_until_success() {
        let calls = &AtomicU32::new(0);

        let result = RetryPolicy::default()
            .run("send", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SendError::RateLimited(Some(Duration::from_secs(2))))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = RetryPolicy::default()
            .run("send", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SendError::RateLimited(None))
            })
            .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = RetryPolicy::immediate()
            .run("send", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SendError::Api("bad request".to_string()))
            })
            .await;

        assert!(matches!(result, Err(SendError::Api(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
