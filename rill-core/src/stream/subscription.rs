//! Subscription handles and watcher identities.
//!
//! Every registration on a pipe gets a [`WatcherId`] and hands back a
//! [`Subscription`]: a once-only cancel handle. The same handle type doubles
//! as the teardown returned by transform wirings and as the cancel token of
//! scheduled timers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Identity of one entry on a pipe's watcher or catcher list.
///
/// Handles remove their entry by this ID, not by callback. Registering the
/// same callback twice gives two entries that are removed independently,
/// and a stale handle can never remove a later registration of the same
/// callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    /// Allocate the ID for a new registration. IDs grow with allocation
    /// order across every pipe in the process.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw number, for log fields.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watcher#{}", self.0)
    }
}

type Cancel = Box<dyn FnOnce() + Send>;

/// An idempotent cancel handle.
///
/// Calling [`unsubscribe`](Subscription::unsubscribe) runs the wrapped
/// cancel action the first time and does nothing afterwards. Clones share
/// that once-only state. Dropping a subscription does not cancel it.
#[derive(Clone)]
pub struct Subscription {
    cancel: Arc<Mutex<Option<Cancel>>>,
}

impl Subscription {
    /// Wrap a cancel action.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Arc::new(Mutex::new(Some(Box::new(cancel)))),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(None)),
        }
    }

    /// Bundle several handles into one that cancels them in order.
    pub fn all(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let subscriptions: Vec<_> = subscriptions.into_iter().collect();
        Self::new(move || {
            for subscription in subscriptions {
                subscription.unsubscribe();
            }
        })
    }

    /// Run the cancel action if it has not run yet.
    pub fn unsubscribe(&self) {
        // Take before calling so a reentrant unsubscribe sees `None`.
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether the cancel action has already run.
    pub fn is_closed(&self) -> bool {
        self.cancel.lock().is_none()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
