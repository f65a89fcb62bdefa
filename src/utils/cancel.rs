// src/utils/cancel.rs

//! Run-wide cancellation signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Cloneable flag that stops new network work once raised.
#[derive(Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the flag. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag is raised.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Raise the flag after `deadline` unless the returned handle is
    /// aborted first.
    pub fn cancel_after(&self, deadline: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            log::warn!("Run deadline of {:?} reached, cancelling", deadline);
            this.cancel();
        })
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let cancel = Cancellation::new();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { cancel.cancelled().await })
        };
        assert!(!cancel.is_cancelled());
        cancel.cancel();
        waiter.await.unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_raises_flag() {
        let cancel = Cancellation::new();
        let _timer = cancel.cancel_after(Duration::from_secs(5));
        cancel.cancelled().await;
        assert!(cancel.is_cancelled());
    }
}
