//! Event Implementation
//!
//! An Event is the read-only half of a stream. It wraps any [`Source`]: a
//! [`Pipe`], an external adapter, or a derived node built by
//! [`Event::transform`].
//!
//! # Derived Nodes
//!
//! A derived node is a private pipe plus a [`Lifecycle`]. Watching the node
//! registers on the private pipe; unsubscribing (by handle or by `unwatch`)
//! re-checks the lifecycle, which tears down the upstream binding once the
//! node is unobserved and unretained. Because the upstream binding of one
//! derived node is a watcher on the next node up, releasing the tail of a
//! chain releases the whole chain.

use std::fmt;
use std::ops::{Add, Mul};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::lifecycle::Lifecycle;
use super::pipe::Pipe;
use super::subscription::Subscription;
use super::{Catcher, Value, Watcher};
use crate::error::{Fault, FlowError};
use crate::ops::{self, Functor, Predicate, Shape};
use crate::scheduler::Scheduler;

/// Anything that can be watched.
///
/// This is the adapter boundary: implement it (or use [`Event::adapter`])
/// to bring an external push source into the graph. Sources without an
/// error channel can keep the default `catch`/`uncatch`.
pub trait Source<T: Value>: Send + Sync {
    /// Register a watcher.
    fn watch(&self, watcher: Watcher<T>) -> Subscription;

    /// Remove a previously registered watcher.
    fn unwatch(&self, watcher: &Watcher<T>);

    /// Register a fault handler.
    fn catch(&self, _handler: Catcher) -> Subscription {
        Subscription::noop()
    }

    /// Remove a previously registered fault handler.
    fn uncatch(&self, _handler: &Catcher) {}
}

/// The sink handed to transform wirings.
///
/// Emitting fires the derived node's private pipe.
pub struct Emitter<T: Value> {
    pipe: Pipe<T>,
}

impl<T: Value> Emitter<T> {
    /// An emitter that fires into `pipe`.
    pub fn new(pipe: Pipe<T>) -> Self {
        Self { pipe }
    }

    /// Send a value downstream.
    pub fn emit(&self, value: T) {
        self.pipe.fire(value);
    }

    /// Send a fault to downstream catch handlers.
    pub fn raise(&self, fault: Fault) {
        self.pipe.raise(fault);
    }

    /// Send either a value or a fault.
    pub fn dispatch(&self, item: Result<T, Fault>) {
        self.pipe.dispatch(item);
    }
}

impl<T: Value> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            pipe: self.pipe.clone(),
        }
    }
}

/// A node produced by [`Event::transform`].
struct Derived<T: Value> {
    pipe: Pipe<T>,
    lifecycle: Lifecycle,
}

impl<T: Value> Derived<T> {
    fn settle(&self) {
        self.lifecycle.settle(self.pipe.count_watchers());
    }
}

impl<T: Value> Source<T> for Arc<Derived<T>> {
    fn watch(&self, watcher: Watcher<T>) -> Subscription {
        if self.lifecycle.is_released() {
            debug!("watching a released derived node; it will not emit again");
        }
        let registration = self.pipe.watch_shared(watcher);
        let node = Arc::clone(self);
        Subscription::new(move || {
            registration.unsubscribe();
            node.settle();
        })
    }

    fn unwatch(&self, watcher: &Watcher<T>) {
        self.pipe.unwatch(watcher);
        self.settle();
    }

    fn catch(&self, handler: Catcher) -> Subscription {
        self.pipe.catch_shared(handler)
    }

    fn uncatch(&self, handler: &Catcher) {
        self.pipe.uncatch(handler);
    }
}

/// An external source described by a pair of functions.
struct Adapter<W, U> {
    watch: W,
    unwatch: U,
}

impl<T, W, U> Source<T> for Adapter<W, U>
where
    T: Value,
    W: Fn(Watcher<T>) -> Subscription + Send + Sync,
    U: Fn(&Watcher<T>) + Send + Sync,
{
    fn watch(&self, watcher: Watcher<T>) -> Subscription {
        (self.watch)(watcher)
    }

    fn unwatch(&self, watcher: &Watcher<T>) {
        (self.unwatch)(watcher)
    }
}

/// A read-only, watchable stream of values.
///
/// Cloning an event yields another handle to the same source.
pub struct Event<T: Value> {
    source: Arc<dyn Source<T>>,
    node: Option<Arc<Derived<T>>>,
}

impl<T: Value> Event<T> {
    /// Wrap an arbitrary source.
    pub fn from_source(source: Arc<dyn Source<T>>) -> Self {
        Self { source, node: None }
    }

    /// Wrap an external source given its `watch` and `unwatch` functions.
    pub fn adapter<W, U>(watch: W, unwatch: U) -> Self
    where
        W: Fn(Watcher<T>) -> Subscription + Send + Sync + 'static,
        U: Fn(&Watcher<T>) + Send + Sync + 'static,
    {
        Self::from_source(Arc::new(Adapter { watch, unwatch }))
    }

    /// An event that never fires.
    pub fn never() -> Self {
        Pipe::new().event()
    }

    /// Build a derived event.
    ///
    /// `wiring` runs once, right away. It receives the emitter for the new
    /// node, subscribes to whatever upstream it needs, and returns the
    /// teardown for that subscription.
    pub fn transform<W>(wiring: W) -> Self
    where
        W: FnOnce(Emitter<T>) -> Option<Subscription>,
    {
        let pipe = Pipe::new();
        let teardown = wiring(Emitter::new(pipe.clone()));
        let node = Arc::new(Derived {
            pipe,
            lifecycle: Lifecycle::new(teardown),
        });

        Self {
            source: Arc::new(Arc::clone(&node)),
            node: Some(node),
        }
    }

    /// Merge several events into one, forwarding values in arrival order.
    pub fn merge(events: impl IntoIterator<Item = Event<T>>) -> Self {
        let events: Vec<_> = events.into_iter().collect();
        Self::transform(move |emit| {
            let subscriptions = events.iter().map(|event| {
                let emit = emit.clone();
                event.watch(move |value| emit.emit(value.clone()))
            });
            Some(Subscription::all(subscriptions.collect::<Vec<_>>()))
        })
    }

    /// Register a watcher. Past values are not replayed.
    pub fn watch<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.source.watch(Arc::new(watcher))
    }

    /// Register a shared watcher that can later be passed to
    /// [`unwatch`](Event::unwatch).
    pub fn watch_shared(&self, watcher: Watcher<T>) -> Subscription {
        self.source.watch(watcher)
    }

    /// Remove a shared watcher.
    pub fn unwatch(&self, watcher: &Watcher<T>) {
        self.source.unwatch(watcher)
    }

    /// Register a fault handler.
    pub fn catch<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Fault) + Send + Sync + 'static,
    {
        self.source.catch(Arc::new(handler))
    }

    /// Register a shared fault handler.
    pub fn catch_shared(&self, handler: Catcher) -> Subscription {
        self.source.catch(handler)
    }

    /// Remove a shared fault handler.
    pub fn uncatch(&self, handler: &Catcher) {
        self.source.uncatch(handler)
    }

    /// Keep this node's upstream alive even with no watchers.
    ///
    /// No-op on events that are not derived.
    pub fn retain(self) -> Self {
        if let Some(node) = &self.node {
            node.lifecycle.retain();
        }
        self
    }

    /// Undo one [`retain`](Event::retain) and release the upstream if
    /// nothing else holds it.
    pub fn free(&self) {
        if let Some(node) = &self.node {
            node.lifecycle.free(node.pipe.count_watchers());
        }
    }

    /// Whether this derived node has dropped its upstream binding.
    pub fn is_released(&self) -> bool {
        self.node
            .as_ref()
            .map(|node| node.lifecycle.is_released())
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Combinators
    // ------------------------------------------------------------------

    /// Emit zero or more values per source value.
    pub fn multimap<U, F>(&self, f: F) -> Event<U>
    where
        U: Value,
        F: Fn(&T, &Emitter<U>) + Send + Sync + 'static,
    {
        ops::multimap(self, f)
    }

    /// Emit `f(value)` for every value.
    pub fn map<U, F>(&self, f: F) -> Event<U>
    where
        U: Value,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        ops::map(self, f)
    }

    /// Emit the value found at a dotted property path.
    pub fn pluck(&self, path: &str) -> Result<Event<serde_json::Value>, FlowError>
    where
        T: Serialize,
    {
        ops::pluck(self, path)
    }

    /// Emit whether each value structurally matches `shape`.
    pub fn map_matches(&self, shape: Shape) -> Event<bool>
    where
        T: Serialize,
    {
        ops::map_matches(self, shape)
    }

    /// Pass values for which the predicate holds.
    pub fn filter(&self, predicate: impl Into<Predicate<T>>) -> Event<T> {
        ops::filter(self, predicate)
    }

    /// Pass truthy values.
    pub fn filter_truthy(&self) -> Event<T>
    where
        T: ops::Truthy,
    {
        ops::filter(self, Predicate::truthy())
    }

    /// Pass values for which the predicate does not hold.
    pub fn exclude(&self, predicate: impl Into<Predicate<T>>) -> Event<T> {
        ops::exclude(self, predicate)
    }

    /// Drop values equal to the previous accepted value.
    pub fn unique(&self) -> Event<T>
    where
        T: PartialEq,
    {
        ops::unique(self)
    }

    /// Drop values that `eq` considers equal to the previous accepted value.
    pub fn unique_by<F>(&self, eq: F) -> Event<T>
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        ops::unique_by(self, eq)
    }

    /// Running accumulation seeded by the first value, which is not emitted.
    pub fn reduce<F>(&self, f: F) -> Event<T>
    where
        F: Fn(&T, &T) -> T + Send + Sync + 'static,
    {
        ops::reduce(self, f)
    }

    /// Running accumulation from `seed`, emitted on every value.
    pub fn fold<A, F>(&self, seed: A, f: F) -> Event<A>
    where
        A: Value,
        F: Fn(&A, &T) -> A + Send + Sync + 'static,
    {
        ops::fold(self, seed, f)
    }

    /// Running sum.
    pub fn sum(&self) -> Event<T>
    where
        T: Add<Output = T> + From<u8>,
    {
        ops::sum(self)
    }

    /// Running product.
    pub fn product(&self) -> Event<T>
    where
        T: Mul<Output = T> + From<u8>,
    {
        ops::product(self)
    }

    /// Emit the latest value once the source has been quiet for `delay`.
    pub fn debounce(&self, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Event<T> {
        ops::debounce(self, delay, scheduler)
    }

    /// Queue values and flush them whenever `gate` fires.
    pub fn sync<G: Value>(&self, gate: &Event<G>) -> Event<T> {
        ops::sync(self, gate)
    }

    /// Follow the inner stream selected by the latest value.
    pub fn flat_map<U, I, F>(&self, f: F) -> Event<U>
    where
        U: Value,
        I: Functor<U> + Send + Sync + 'static,
        F: Fn(&T) -> I + Send + Sync + 'static,
    {
        ops::flat_map(self, f)
    }
}

impl<T: Value> Functor<T> for Event<T> {
    type Lifted<U: Value> = Event<U>;

    fn bind(&self, watcher: Watcher<T>) -> Subscription {
        self.watch_shared(watcher)
    }

    fn lift<U, W>(&self, wiring: W) -> Event<U>
    where
        U: Value,
        W: FnOnce(Emitter<U>) -> Option<Subscription>,
    {
        Event::transform(wiring)
    }
}

impl<T: Value> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            node: self.node.clone(),
        }
    }
}

impl<T: Value> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Event");
        debug.field("derived", &self.node.is_some());
        if let Some(node) = &self.node {
            debug
                .field("watchers", &node.pipe.count_watchers())
                .field("lifecycle", &node.lifecycle);
        }
        debug.finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
