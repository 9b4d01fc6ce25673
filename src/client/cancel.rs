//! Cooperative cancellation handle for visits.

use tokio::sync::watch;

/// Cancellation handle of one visit.
///
/// Handed to callers through `on_cancel_token`. Cancelling aborts the
/// underlying transport (when the adapter supports abort) and flips the
/// visit's state flags; the orchestrator re-checks them before every
/// state-mutating step. Cancelling is idempotent: calling it any number
/// of times cancels the visit once.
///
/// # Examples
///
/// ```
/// use glide_rs::CancelToken;
///
/// let token = CancelToken::new();
/// assert!(!token.is_cancelled());
/// token.cancel();
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancelToken {
    inner: std::sync::Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        CancelToken {
            inner: std::sync::Arc::new(tx),
        }
    }

    /// Cancel the visit. Idempotent.
    pub fn cancel(&self) {
        self.inner.send_replace(true);
    }

    /// Whether the visit has been cancelled.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.borrow()
    }

    /// Resolve once the token is cancelled. Resolves immediately when it
    /// already is.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.subscribe();
        // wait_for checks the current value first, so a cancel that
        // happened before this call still resolves.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(50), token.cancelled())
            .await
            .expect("should not block");
    }
}
