// ABOUTME: Apply-wide cancellation signal built on a tokio watch channel.
// ABOUTME: Tokens are cheap to clone and observed at every suspension point.

use tokio::sync::watch;

/// Sending half of the cancellation signal, held by the CLI.
#[derive(Debug)]
pub struct CancelController {
    tx: watch::Sender<bool>,
}

/// Receiving half, observed by workers, the waiter, and retry backoff.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Create a linked controller/token pair.
pub fn cancel_pair() -> (CancelController, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelController { tx }, CancelToken { rx })
}

impl CancelController {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested. If the controller is
    /// gone without cancelling, this never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn token_observes_cancellation() {
        let (controller, token) = cancel_pair();
        assert!(!token.is_cancelled());

        controller.cancel();
        assert!(token.is_cancelled());
        token.cancelled().await;
    }

    #[tokio::test]
    async fn dropped_controller_never_cancels() {
        let (controller, token) = cancel_pair();
        drop(controller);

        let waited = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(waited.is_err());
        assert!(!token.is_cancelled());
    }
}
