//! Retry with exponential backoff for reasoning calls.
//!
//! Only transient failures (rate limiting, timeouts, transport errors and
//! 5xx statuses) are retried.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::config::duration_str;
use crate::providers::ProviderError;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,

    /// Delay before the first retry
    #[serde(with = "duration_str")]
    pub min_delay: Duration,

    /// Upper bound on any single delay
    #[serde(with = "duration_str")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }

    /// Run `operation`, retrying transient failures.
    pub async fn run<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        f.retry(self.backoff())
            .sleep(tokio::time::sleep)
            .when(ProviderError::is_transient)
            .notify(|err: &ProviderError, delay: Duration| {
                tracing::warn!(operation, error = %err, ?delay, "Retrying after transient failure");
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result = RetryPolicy::default()
            .run("test", || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProviderError::Timeout(Duration::from_secs(1)))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result: Result<(), _> = RetryPolicy::default()
            .run("test", || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::RateLimited { retry_after: None })
            })
            .await;

        assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_fail_fast() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result: Result<(), _> = RetryPolicy::default()
            .run("test", || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::AuthError)
            })
            .await;

        assert!(matches!(result, Err(ProviderError::AuthError)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_policy_runs_once() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let _: Result<(), _> = RetryPolicy::none()
            .run("test", || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::HttpError("reset".into()))
            })
            .await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
