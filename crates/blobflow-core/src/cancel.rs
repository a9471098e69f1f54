//! Transfer-scoped cancellation.

use std::sync::Arc;

use tokio::sync::watch;

/// Cooperative cancellation signal for one transfer.
///
/// Cancellation stops new batch requests from being issued and abandons
/// in-flight part PUTs. Because the remote object is only created at
/// completion, canceling before completion leaves no visible artifact.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a fresh, uncanceled token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the cancellation signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal fires. Resolves immediately if it already
    /// has.
    pub async fn canceled(&self) {
        let mut rx = self.tx.subscribe();
        // wait_for only errs when the sender is dropped, which cannot
        // happen while `self` holds it.
        let _ = rx.wait_for(|canceled| *canceled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
