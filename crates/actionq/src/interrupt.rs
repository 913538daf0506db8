use std::sync::Arc;

use tokio::sync::watch;

// ─── Interrupt ────────────────────────────────────────────────────────────

/// Process-wide, one-shot completion-wait interrupt.
///
/// Created once at process start and cloned into every [`ActionInitiator`];
/// clones share the same underlying signal. Triggering it (typically from a
/// SIGINT handler, so a ctrl-C manifests as an instant wake rather than a
/// hung wait) unblocks every outstanding and future wait call at once.
/// The trigger is idempotent and irreversible for the life of the process.
///
/// [`ActionInitiator`]: crate::initiator::ActionInitiator
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Interrupt { tx: Arc::new(tx) }
    }

    /// Fire the signal. Safe to call more than once; repeats are no-ops.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has fired. Returns immediately if it
    /// already has; otherwise waits for the broadcast.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives inside self, so wait_for cannot observe a
        // closed channel while this future is borrowed from it.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Interrupt::new()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn starts_untriggered() {
        let interrupt = Interrupt::new();
        assert!(!interrupt.is_triggered());

        tokio::select! {
            () = interrupt.triggered() => panic!("fired without trigger"),
            () = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
    }

    #[tokio::test]
    async fn trigger_wakes_current_and_future_waiters() {
        let interrupt = Interrupt::new();
        let waiter = interrupt.clone();
        let pending = tokio::spawn(async move { waiter.triggered().await });

        tokio::task::yield_now().await;
        interrupt.trigger();
        pending.await.unwrap();

        // A wait that starts after the trigger resolves immediately.
        interrupt.triggered().await;
        assert!(interrupt.is_triggered());
    }

    #[tokio::test]
    async fn trigger_is_idempotent() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        interrupt.trigger();
        assert!(interrupt.is_triggered());
        interrupt.triggered().await;
    }

    #[tokio::test]
    async fn clones_share_the_signal() {
        let a = Interrupt::new();
        let b = a.clone();
        b.trigger();
        assert!(a.is_triggered());
    }
}
