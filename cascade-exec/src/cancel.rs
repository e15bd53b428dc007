//! Cooperative cancellation, spec §5 "cascade cancellation": aborts the
//! in-flight tier attempt at its next suspension point and short-circuits
//! any tiers still queued behind it.

use tokio::sync::watch;

/// A cancellation signal shared across one cascade execution.
///
/// Backed by a `watch` channel rather than a bare `Notify` so a
/// `cancel()` that races ahead of the first `cancelled().await` is
/// still observed — `watch` stores the current value instead of only
/// waking already-registered waiters.
#[derive(Clone)]
pub struct CancellationSignal {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// Construct a signal that has not fired yet.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    /// Mark this signal as cancelled. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether `cancel()` has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; resolves immediately if already cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_immediately_once_fired() {
        let signal = CancellationSignal::new();
        signal.cancel();
        assert!(signal.is_cancelled());
        signal.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_wakes_a_concurrent_waiter() {
        let signal = CancellationSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        assert!(!signal.is_cancelled());
        signal.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn clone_shares_the_same_signal() {
        let a = CancellationSignal::new();
        let b = a.clone();
        b.cancel();
        assert!(a.is_cancelled());
    }
}
