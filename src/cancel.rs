use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable cancellation handle threaded through every transport call.
///
/// Cancellation before or between retry attempts aborts immediately; an
/// in-flight request or backoff sleep is raced against the token, so
/// mid-sleep cancellation is best-effort rather than guaranteed lock-step.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // wait_for checks the current value first, so a token cancelled
        // before this call resolves immediately. The sender cannot drop
        // while &self is alive.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
