use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::repository::RepositoryError;
use crate::config::LeasingConfig;

/// Timeout and bounded retry applied to every storage call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl CallPolicy {
    pub fn from_config(config: &LeasingConfig) -> Self {
        Self {
            timeout: config.storage_timeout,
            max_attempts: config.retry_attempts.max(1),
            initial_backoff: config.retry_backoff,
        }
    }

    /// Single attempt, no backoff. Useful for tests that assert on first failures.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or attempts run out.
    /// Only `RepositoryError::Unavailable` (including timeouts) is retried.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(RepositoryError::Unavailable(format!(
                    "{operation} timed out after {}ms",
                    self.timeout.as_millis()
                ))),
            };

            match outcome {
                Err(RepositoryError::Unavailable(reason)) if attempt < attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        %reason,
                        "storage unavailable, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from_config(&LeasingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(attempts: u32) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(50),
            max_attempts: attempts,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_unavailable_until_success() {
        let calls = AtomicU32::new(0);
        let result = policy(3)
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RepositoryError::Unavailable("offline".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.expect("third attempt succeeds"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(2)
            .run("offline", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RepositoryError::Unavailable("offline".to_string()))
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(5)
            .run("conflict", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RepositoryError::Conflict)
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::Conflict)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_surface_as_unavailable() {
        let result: Result<(), _> = policy(1)
            .run("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        match result {
            Err(RepositoryError::Unavailable(reason)) => assert!(reason.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
