use crate::error::SearchError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Bounded exponential backoff for idempotent backend reads.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let scaled = self
            .base_delay
            .saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
        scaled.min(self.max_delay).max(self.base_delay)
    }
}

/// Wall-clock budget for one orchestration call. Backend calls race against
/// the remaining budget; exhaustion surfaces as `BackendTimeout`, never as a
/// truncated result.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn remaining(&self, backend: &str) -> Result<Duration, SearchError> {
        let elapsed = self.started.elapsed();
        if elapsed >= self.budget {
            return Err(SearchError::BackendTimeout {
                backend: backend.to_string(),
            });
        }
        Ok(self.budget - elapsed)
    }
}

/// Runs a backend read under the request deadline, retrying transient
/// failures with bounded exponential backoff. A deadline hit is returned
/// immediately; there is no budget left to retry into.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    deadline: &Deadline,
    backend: &str,
    operation: F,
) -> Result<T, SearchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let mut attempt = 1u32;
    loop {
        let remaining = deadline.remaining(backend)?;
        match tokio::time::timeout(remaining, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) if error.is_transient() && attempt < policy.max_attempts => {
                debug!(backend, attempt, %error, "transient backend failure, backing off");
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Ok(Err(error)) => return Err(error),
            Err(_elapsed) => {
                return Err(SearchError::BackendTimeout {
                    backend: backend.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(450),
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(450));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let deadline = Deadline::new(Duration::from_secs(5));
        let calls = AtomicU32::new(0);

        let result = with_backoff(&policy, &deadline, "lexical", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(SearchError::BackendUnavailable {
                        backend: "lexical".to_string(),
                        details: "503".to_string(),
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let deadline = Deadline::new(Duration::from_secs(5));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_backoff(&policy, &deadline, "lexical", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SearchError::InvalidRequest("missing query".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(SearchError::InvalidRequest(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_deadline_surfaces_as_timeout() {
        let policy = RetryPolicy::default();
        let deadline = Deadline::new(Duration::from_millis(0));

        let result: Result<(), _> =
            with_backoff(&policy, &deadline, "oracle", || async { Ok(()) }).await;

        assert!(matches!(
            result,
            Err(SearchError::BackendTimeout { backend }) if backend == "oracle"
        ));
    }
}
