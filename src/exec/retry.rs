// ABOUTME: Retry boundary for provider calls.
// ABOUTME: Transient failures back off exponentially up to a bounded count.

use crate::provider::ProviderError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use super::cancel::CancelToken;

/// Bounds for the retry loop around every provider call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based): doubled each
    /// time, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error(transparent)]
    Provider(ProviderError),

    #[error("operation cancelled")]
    Cancelled,
}

/// Run a provider call, retrying transient failures with backoff.
///
/// Permanent failures and exhausted retries surface immediately; the
/// backoff sleep is a cancellation point.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut call: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                attempt += 1;
                tracing::debug!(
                    "transient provider failure (attempt {attempt}/{}), retrying in {:?}: {e}",
                    policy.max_retries,
                    delay
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => return Err(RetryError::Cancelled),
                }
            }
            Err(e) => return Err(RetryError::Provider(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::cancel::cancel_pair;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(10), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let (_controller, token) = cancel_pair();
        let calls = AtomicU32::new(0);

        let result = with_retries(&policy, &token, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(ProviderError::Unavailable {
                        message: "busy".to_string(),
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
    async fn permanent_errors_fail_immediately() {
        let policy = RetryPolicy::default();
        let (_controller, token) = cancel_pair();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retries(&policy, &token, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::Rejected {
                    message: "bad request".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Provider(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_error() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let (_controller, token) = cancel_pair();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retries(&policy, &token, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::RateLimited {
                    message: "slow down".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Provider(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
