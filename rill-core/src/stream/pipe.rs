//! Pipe Implementation
//!
//! A Pipe is the fireable end of an event stream. It owns two ordered lists:
//! watchers, which receive ordinary values, and catch handlers, which
//! receive [`Fault`]s.
//!
//! # Delivery
//!
//! `fire` takes a snapshot of the watcher list and walks it in registration
//! order, calling each watcher synchronously. Two rules keep reentrant
//! callbacks predictable:
//!
//! 1. A watcher registered during a pass is not in the snapshot, so it only
//!    sees later fires.
//!
//! 2. Each entry carries a liveness flag. Removing a watcher clears its flag,
//!    so a watcher removed mid-pass is skipped if the pass has not reached it
//!    yet.
//!
//! No lock is held while a callback runs, which lets callbacks fire, watch
//! and unwatch on any pipe (including this one) without deadlocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::event::{Event, Source};
use super::subscription::{Subscription, WatcherId};
use super::{Catcher, Value, Watcher};
use crate::error::Fault;

/// Most pipes have a handful of watchers; keep those inline.
type Entries<F> = SmallVec<[Entry<F>; 4]>;

/// A single registration in a [`Registry`].
struct Entry<F: ?Sized> {
    id: WatcherId,
    live: Arc<AtomicBool>,
    callback: Arc<F>,
}

impl<F: ?Sized> Clone for Entry<F> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            live: Arc::clone(&self.live),
            callback: Arc::clone(&self.callback),
        }
    }
}

/// Ordered list of callbacks with stable removal.
struct Registry<F: ?Sized> {
    entries: Mutex<Entries<F>>,
}

impl<F: ?Sized> Registry<F> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(SmallVec::new()),
        }
    }

    fn add(&self, callback: Arc<F>) -> WatcherId {
        let id = WatcherId::next();
        self.entries.lock().push(Entry {
            id,
            live: Arc::new(AtomicBool::new(true)),
            callback,
        });
        id
    }

    fn remove_id(&self, id: WatcherId) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                let entry = entries.remove(index);
                entry.live.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    fn remove_callback(&self, callback: &Arc<F>) -> bool {
        let mut entries = self.entries.lock();
        let target = Arc::as_ptr(callback);
        match entries
            .iter()
            .position(|entry| std::ptr::addr_eq(Arc::as_ptr(&entry.callback), target))
        {
            Some(index) => {
                let entry = entries.remove(index);
                entry.live.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Entries<F> {
        self.entries.lock().clone()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

struct PipeInner<T: Value> {
    watchers: Registry<dyn Fn(&T) + Send + Sync>,
    catchers: Registry<dyn Fn(&Fault) + Send + Sync>,
}

/// A fireable event source.
///
/// Cloning a pipe yields another handle to the same watcher lists.
///
/// # Example
///
/// ```rust
/// use rill_core::stream::Pipe;
///
/// let pipe = Pipe::new();
/// let doubled = pipe.event().map(|x: &i32| x * 2);
///
/// doubled.watch(|x| println!("got {x}"));
/// pipe.fire(21); // prints "got 42"
/// ```
pub struct Pipe<T: Value> {
    inner: Arc<PipeInner<T>>,
}

impl<T: Value> Pipe<T> {
    /// Create a pipe with no watchers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PipeInner {
                watchers: Registry::new(),
                catchers: Registry::new(),
            }),
        }
    }

    /// The read-only view of this pipe.
    pub fn event(&self) -> Event<T> {
        Event::from_source(Arc::new(self.clone()))
    }

    /// Deliver a value to every watcher, in registration order.
    pub fn fire(&self, value: T) {
        let entries = self.inner.watchers.snapshot();
        trace!(watchers = entries.len(), "pipe fired");

        for entry in entries.iter() {
            if entry.live.load(Ordering::Acquire) {
                (entry.callback)(&value);
            }
        }
    }

    /// Deliver a fault to every catch handler, in registration order.
    pub fn raise(&self, fault: Fault) {
        let entries = self.inner.catchers.snapshot();
        if entries.is_empty() {
            debug!(%fault, "fault raised with no catch handlers");
            return;
        }

        for entry in entries.iter() {
            if entry.live.load(Ordering::Acquire) {
                (entry.callback)(&fault);
            }
        }
    }

    /// Route a value to the watchers or a fault to the catch handlers.
    pub fn dispatch(&self, item: Result<T, Fault>) {
        match item {
            Ok(value) => self.fire(value),
            Err(fault) => self.raise(fault),
        }
    }

    /// Register a watcher. The returned handle removes it.
    pub fn watch<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.watch_shared(Arc::new(watcher))
    }

    /// Register a shared watcher, which can later be passed to
    /// [`unwatch`](Pipe::unwatch).
    pub fn watch_shared(&self, watcher: Watcher<T>) -> Subscription {
        let id = self.inner.watchers.add(watcher);
        trace!(%id, "watcher added");

        let pipe = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = Weak::upgrade(&pipe) {
                inner.watchers.remove_id(id);
            }
        })
    }

    /// Remove the first registration of `watcher`. Does nothing if it is
    /// not registered.
    pub fn unwatch(&self, watcher: &Watcher<T>) {
        if self.inner.watchers.remove_callback(watcher) {
            trace!("watcher removed");
        }
    }

    /// Register a fault handler. The returned handle removes it.
    pub fn catch<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Fault) + Send + Sync + 'static,
    {
        self.catch_shared(Arc::new(handler))
    }

    /// Register a shared fault handler, which can later be passed to
    /// [`uncatch`](Pipe::uncatch).
    pub fn catch_shared(&self, handler: Catcher) -> Subscription {
        let id = self.inner.catchers.add(handler);

        let pipe = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = Weak::upgrade(&pipe) {
                inner.catchers.remove_id(id);
            }
        })
    }

    /// Remove the first registration of `handler`.
    pub fn uncatch(&self, handler: &Catcher) {
        self.inner.catchers.remove_callback(handler);
    }

    /// Number of registered watchers.
    pub fn count_watchers(&self) -> usize {
        self.inner.watchers.len()
    }

    /// Number of registered catch handlers.
    pub fn count_catchers(&self) -> usize {
        self.inner.catchers.len()
    }
}

impl<T: Value> Default for Pipe<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value> Clone for Pipe<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Value> std::fmt::Debug for Pipe<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("watchers", &self.count_watchers())
            .field("catchers", &self.count_catchers())
            .finish()
    }
}

impl<T: Value> Source<T> for Pipe<T> {
    fn watch(&self, watcher: Watcher<T>) -> Subscription {
        self.watch_shared(watcher)
    }

    fn unwatch(&self, watcher: &Watcher<T>) {
        Pipe::unwatch(self, watcher)
    }

    fn catch(&self, handler: Catcher) -> Subscription {
        self.catch_shared(handler)
    }

    fn uncatch(&self, handler: &Catcher) {
        Pipe::uncatch(self, handler)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
