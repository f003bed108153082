//! Completion counter for outstanding workers.
//!
//! Each worker owns a `CompletionGuard`; dropping it decrements the count.
//! The guard is released on every exit path of the owning task, so a
//! failing worker can never leave `wait` hanging.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    remaining: AtomicUsize,
    notify: Notify,
}

/// Count of workers that have not finished yet.
#[derive(Debug, Clone, Default)]
pub struct CompletionCounter {
    inner: Arc<Inner>,
}

impl CompletionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more outstanding worker.
    pub fn register(&self) -> CompletionGuard {
        self.inner.remaining.fetch_add(1, Ordering::AcqRel);
        CompletionGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of guards still alive.
    pub fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::Acquire)
    }

    /// Wait until every registered guard has been dropped.
    pub async fn wait(&self) {
        loop {
            // Created before the check so a concurrent notify_waiters is not missed.
            let notified = self.inner.notify.notified();
            if self.remaining() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Marks one outstanding worker; decrements the counter when dropped.
#[derive(Debug)]
pub struct CompletionGuard {
    inner: Arc<Inner>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.inner.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}
