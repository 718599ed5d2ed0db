//! Outbound fetch with timeout, bounded retry, and cancellation.

mod client;

pub use client::*;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Fetch failure classification.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream returned HTTP {0}")]
    Http(u16),
    #[error("upstream reported failure: {0}")]
    Api(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Only timeouts are worth another attempt; everything else is a
    /// deterministic failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}

/// How a resilient fetch settled.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// The request succeeded within the attempt budget.
    Ok(T),
    /// Non-retryable failure, or the retry budget ran out.
    Err(FetchError),
    /// The caller cancelled. Not an error; never applied to state.
    Cancelled,
}

/// Retry knobs for [`fetch_with_resilience`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Hard deadline for a single attempt.
    pub timeout: Duration,
    /// Extra attempts after a timed-out one.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Run `request` under a hard per-attempt timeout, retrying timed-out
/// attempts with a fixed delay in between.
///
/// Cancellation is checked before every attempt and interrupts both the
/// request and the retry sleep; a cancelled call settles as
/// [`FetchOutcome::Cancelled`] without issuing further attempts.
/// Non-timeout errors fail fast on first occurrence.
pub async fn fetch_with_resilience<T, F, Fut>(
    mut request: F,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> FetchOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return FetchOutcome::Cancelled;
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return FetchOutcome::Cancelled,
            r = tokio::time::timeout(policy.timeout, request()) => {
                r.unwrap_or(Err(FetchError::Timeout(policy.timeout)))
            }
        };

        match result {
            Ok(data) => return FetchOutcome::Ok(data),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    "Fetch: attempt {} timed out, retrying in {:?} ({} of {} retries)",
                    attempt,
                    policy.retry_delay,
                    attempt,
                    policy.max_retries
                );

                tokio::select! {
                    _ = cancel.cancelled() => return FetchOutcome::Cancelled,
                    _ = tokio::time::sleep(policy.retry_delay) => {}
                }
            }
            Err(e) => return FetchOutcome::Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 2,
            retry_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_two_timeouts_then_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let request = move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(FetchError::Timeout(Duration::from_millis(50)))
                } else {
                    Ok(42u32)
                }
            }
        };

        let cancel = CancellationToken::new();
        let outcome = fetch_with_resilience(request, &quick_policy(), &cancel).await;

        assert!(matches!(outcome, FetchOutcome::Ok(42)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let request = move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FetchError::Timeout(Duration::from_millis(50)))
            }
        };

        let cancel = CancellationToken::new();
        let outcome = fetch_with_resilience(request, &quick_policy(), &cancel).await;

        assert!(matches!(outcome, FetchOutcome::Err(FetchError::Timeout(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_hard_timeout_enforced() {
        let request = || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(0u32)
        };

        let policy = RetryPolicy {
            timeout: Duration::from_millis(20),
            max_retries: 0,
            retry_delay: Duration::from_millis(1),
        };
        let cancel = CancellationToken::new();
        let outcome = fetch_with_resilience(request, &policy, &cancel).await;

        assert!(matches!(outcome, FetchOutcome::Err(FetchError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_application_error_is_not_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let request = move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FetchError::Api("upstream said no".to_string()))
            }
        };

        let cancel = CancellationToken::new();
        let outcome = fetch_with_resilience(request, &quick_policy(), &cancel).await;

        assert!(matches!(outcome, FetchOutcome::Err(FetchError::Api(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancelled_before_first_attempt() {
        tokio_test::block_on(async {
            let attempts = Arc::new(AtomicU32::new(0));
            let counter = attempts.clone();
            let request = move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(0u32)
                }
            };

            let cancel = CancellationToken::new();
            cancel.cancel();

            let outcome = fetch_with_resilience(request, &quick_policy(), &cancel).await;

            assert!(matches!(outcome, FetchOutcome::Cancelled));
            assert_eq!(attempts.load(Ordering::SeqCst), 0);
        });
    }

    #[tokio::test]
    async fn test_cancelled_during_retry_delay() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let request = move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FetchError::Timeout(Duration::from_millis(50)))
            }
        };

        // Long delay so the cancel lands mid-sleep
        let policy = RetryPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 2,
            retry_delay: Duration::from_secs(30),
        };

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = fetch_with_resilience(request, &policy, &cancel).await;

        assert!(matches!(outcome, FetchOutcome::Cancelled));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_during_request() {
        let request = || async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(0u32)
        };

        let policy = RetryPolicy {
            timeout: Duration::from_secs(60),
            max_retries: 0,
            retry_delay: Duration::from_millis(1),
        };

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = fetch_with_resilience(request, &policy, &cancel).await;

        assert!(matches!(outcome, FetchOutcome::Cancelled));
    }
}
