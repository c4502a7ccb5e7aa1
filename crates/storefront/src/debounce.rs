//! Debounced value propagation.
//!
//! A [`Debouncer`] holds at most one pending timer. Each [`Debouncer::push`]
//! cancels the pending timer and starts a new one, so a burst of pushes
//! publishes exactly once, with the last value, after the quiet period.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Delays publication of a value until no new value arrived for `delay`.
pub struct Debouncer<T> {
    delay: Duration,
    published: Arc<watch::Sender<T>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Clone + Send + Sync + 'static> Debouncer<T> {
    /// Create a debouncer publishing `initial` until the first timer fires.
    #[must_use]
    pub fn new(initial: T, delay: Duration) -> Self {
        let (published, _) = watch::channel(initial);
        Self {
            delay,
            published: Arc::new(published),
            pending: Mutex::new(None),
        }
    }

    /// Quiet period before a pushed value is published.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `value` for publication, cancelling any pending one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn push(&self, value: T) {
        let published = Arc::clone(&self.published);
        let delay = self.delay;
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            published.send_replace(value);
        }));
    }

    /// Publish `value` immediately, cancelling any pending one.
    pub fn flush(&self, value: T) {
        if let Some(previous) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            previous.abort();
        }
        self.published.send_replace(value);
    }

    /// The last published value.
    #[must_use]
    pub fn current(&self) -> T {
        self.published.borrow().clone()
    }

    /// Receiver notified on every publication.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.published.subscribe()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(pending) = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pending.abort();
        }
    }
}
