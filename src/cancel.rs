//! Cooperative cancellation of an update run.
//!
//! A [`CancelHandle`] is created by the host, cloned into the client, and
//! flipped from any thread or task. The transfer loops select on
//! [`CancelHandle::cancelled`] at every chunk, so a signal interrupts an
//! in-flight network read instead of waiting for the next checkpoint.
//! During the apply phase the handle is polled between archive entries;
//! an entry that has started writing always completes.

use std::sync::Arc;

use tokio::sync::watch;

/// Clonable cancellation handle.
///
/// All clones share one flag; cancelling any clone cancels the run that
/// holds another. Cancellation is sticky and cannot be reset.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Create a handle in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { inner: Arc::new(tx) }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.inner.send_replace(true);
    }

    /// Whether cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.borrow()
    }

    /// Resolve once cancellation is signalled. Pends forever on a handle
    /// that is never cancelled, which is what a `select!` arm wants.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // Sender gone means nobody can cancel any more; pend
                // forever so the select arm never wins spuriously.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}
