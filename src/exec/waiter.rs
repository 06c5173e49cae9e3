// ABOUTME: Async condition waiter: polls an external readiness predicate.
// ABOUTME: Fixed-interval, side-effect-free polls under a timeout budget.

use crate::provider::ProviderError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use super::cancel::CancelToken;

/// Poll cadence and budget for one awaited condition.
#[derive(Debug, Clone, Copy)]
pub struct WaiterConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("condition not satisfied within {0} seconds")]
    Timeout(u64),

    #[error("condition poll failed: {0}")]
    Poll(ProviderError),

    #[error("wait cancelled")]
    Cancelled,
}

/// Poll `check` until it reports true, the timeout elapses, or the
/// apply is cancelled.
///
/// Each poll must be a side-effect-free read. Transient poll failures
/// count as "not yet" and are retried at the next interval; permanent
/// failures abort the wait. The inter-poll sleep yields to the
/// scheduler, so a waiting node does not pin a worker thread.
pub async fn wait_for_condition<F, Fut>(
    config: &WaiterConfig,
    cancel: &CancelToken,
    mut check: F,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ProviderError>>,
{
    let deadline = Instant::now() + config.timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }

        match check().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) if e.is_transient() => {
                tracing::debug!("transient failure polling condition, will poll again: {e}");
            }
            Err(e) => return Err(WaitError::Poll(e)),
        }

        let now = Instant::now();
        if now + config.poll_interval > deadline {
            return Err(WaitError::Timeout(config.timeout.as_secs()));
        }

        tokio::select! {
            () = tokio::time::sleep(config.poll_interval) => {}
            () = cancel.cancelled() => return Err(WaitError::Cancelled),
        }
    }
}
