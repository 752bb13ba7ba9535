//! Derived Node Lifecycle
//!
//! Every event built by [`Event::transform`](super::Event::transform) owns a
//! `Lifecycle`: the teardown for its upstream subscription plus an explicit
//! retain counter.
//!
//! The node releases its upstream when two conditions hold at the same time:
//!
//! - no watcher is registered on the node's private pipe, and
//! - the retain counter is zero or below.
//!
//! The check runs after every unsubscribe from the node and after every
//! `free`. It may run many times; the teardown runs at most once.

use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};

use tracing::{debug, trace};

use super::subscription::Subscription;

/// Whether a node with the given counts should drop its upstream.
pub fn should_release(watchers: usize, retains: isize) -> bool {
    watchers == 0 && retains <= 0
}

/// Retain counter and upstream teardown of a derived node.
pub struct Lifecycle {
    retains: AtomicIsize,
    released: AtomicBool,
    teardown: Option<Subscription>,
}

impl Lifecycle {
    /// Create a lifecycle guarding the given teardown.
    pub fn new(teardown: Option<Subscription>) -> Self {
        Self {
            retains: AtomicIsize::new(0),
            released: AtomicBool::new(false),
            teardown,
        }
    }

    /// Increment the retain counter. Returns the new count.
    pub fn retain(&self) -> isize {
        let count = self.retains.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(retains = count, "node retained");
        count
    }

    /// Decrement the retain counter and re-check release.
    pub fn free(&self, watchers: usize) -> isize {
        let count = self.retains.fetch_sub(1, Ordering::AcqRel) - 1;
        trace!(retains = count, "node freed");
        self.settle(watchers);
        count
    }

    /// Release the upstream if the counts allow it and it has not been
    /// released yet. Returns `true` if this call ran the teardown.
    pub fn settle(&self, watchers: usize) -> bool {
        if !should_release(watchers, self.retains()) {
            return false;
        }
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        debug!("derived node released upstream");
        if let Some(teardown) = &self.teardown {
            teardown.unsubscribe();
        }
        true
    }

    /// Current retain count.
    pub fn retains(&self) -> isize {
        self.retains.load(Ordering::Acquire)
    }

    /// Whether the upstream has been released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("retains", &self.retains())
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;
    use std::sync::Arc;

    fn counted_teardown() -> (Arc<AtomicI32>, Subscription) {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let teardown = Subscription::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        (calls, teardown)
    }

    #[test]
    fn release_rule() {
        assert!(should_release(0, 0));
        assert!(should_release(0, -1));
        assert!(!should_release(1, 0));
        assert!(!should_release(0, 1));
        assert!(!should_release(3, -2));
    }

    #[test]
    fn settle_runs_teardown_once() {
        let (calls, teardown) = counted_teardown();
        let lifecycle = Lifecycle::new(Some(teardown));

        assert!(lifecycle.settle(0));
        assert!(!lifecycle.settle(0));
        assert!(!lifecycle.settle(0));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lifecycle.is_released());
    }

    #[test]
    fn settle_waits_for_watchers() {
        let (calls, teardown) = counted_teardown();
        let lifecycle = Lifecycle::new(Some(teardown));

        assert!(!lifecycle.settle(2));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(lifecycle.settle(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retain_defers_release_until_matching_free() {
        let (calls, teardown) = counted_teardown();
        let lifecycle = Lifecycle::new(Some(teardown));

        assert_eq!(lifecycle.retain(), 1);
        assert_eq!(lifecycle.retain(), 2);
        assert!(!lifecycle.settle(0));

        assert_eq!(lifecycle.free(0), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(lifecycle.free(0), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_teardown_still_marks_released() {
        let lifecycle = Lifecycle::new(None);
        assert!(lifecycle.settle(0));
        assert!(lifecycle.is_released());
    }
}
