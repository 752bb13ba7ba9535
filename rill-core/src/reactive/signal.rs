//! Signal Implementation
//!
//! A Signal is an event with a memory. It watches a backing [`Event`] and
//! caches the latest value it saw, so the current value can be read at any
//! time.
//!
//! # How Signals Work
//!
//! 1. A signal starts either with an initial value or empty.
//!
//! 2. The signal registers its cache watcher on the backing event before
//!    anyone else can, so every other watcher observes an up-to-date cache.
//!
//! 3. [`bind`](Signal::bind) replays the current value (if any) and then
//!    watches; [`watch`](Signal::watch) never replays.
//!
//! # Derived Signals
//!
//! Combinators on a signal build a new signal backed by a fresh
//! [`Cell`](super::Cell). Since binding replays, derived signals are
//! computed eagerly: `signal.map(f)` holds `f(current)` right away.
//! A derived signal stays bound to its sources until
//! [`detach`](Signal::detach) is called.

use std::ops::{Add, Mul};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use super::cell::Cell;
use crate::error::{Fault, FlowError};
use crate::ops::{self, Functor, Predicate, Shape, Truthy};
use crate::scheduler::Scheduler;
use crate::stream::{Catcher, Emitter, Event, Subscription, Value, Watcher};

/// A reactive value holding the latest value of an event.
///
/// # Example
///
/// ```rust
/// use rill_core::reactive::Cell;
///
/// let count = Cell::new(1);
/// let doubled = count.map(|n: &i32| n * 2);
///
/// assert_eq!(doubled.get(), Some(2));
/// count.set(5);
/// assert_eq!(doubled.get(), Some(10));
/// ```
pub struct Signal<T: Value> {
    /// The cached value. `None` while the signal is empty.
    value: Arc<Mutex<Option<T>>>,

    /// The stream this signal follows.
    event: Event<T>,

    /// Binding to the sources of a derived signal.
    upstream: Subscription,
}

impl<T: Value> Signal<T> {
    /// Follow `event`, starting from `initial` if given.
    pub fn from_event(initial: Option<T>, event: Event<T>) -> Self {
        let value = Arc::new(Mutex::new(initial));

        let cache = Arc::clone(&value);
        event.watch(move |next: &T| {
            *cache.lock() = Some(next.clone());
        });

        Self {
            value,
            event,
            upstream: Subscription::noop(),
        }
    }

    /// A signal that always holds `value`.
    pub fn constant(value: T) -> Self {
        Self::from_event(Some(value), Event::never())
    }

    pub(crate) fn with_upstream(mut self, upstream: Subscription) -> Self {
        self.upstream = upstream;
        self
    }

    /// Build a derived signal backed by a fresh, empty cell.
    pub(crate) fn derive<W>(wiring: W) -> Self
    where
        W: FnOnce(Emitter<T>) -> Option<Subscription>,
    {
        let cell = Cell::empty();
        let upstream = wiring(cell.emitter()).unwrap_or_else(Subscription::noop);
        cell.signal().with_upstream(upstream)
    }

    /// The current value, or `None` if the signal is empty.
    pub fn get(&self) -> Option<T> {
        self.value.lock().clone()
    }

    /// Whether no value has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.value.lock().is_none()
    }

    /// The backing event.
    pub fn event(&self) -> Event<T> {
        self.event.clone()
    }

    /// Watch future values. The current value is not replayed.
    pub fn watch<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.event.watch(watcher)
    }

    /// Watch future values with a shared watcher.
    pub fn watch_shared(&self, watcher: Watcher<T>) -> Subscription {
        self.event.watch_shared(watcher)
    }

    /// Remove a shared watcher.
    pub fn unwatch(&self, watcher: &Watcher<T>) {
        self.event.unwatch(watcher)
    }

    /// Call `watcher` with the current value right away (if there is one),
    /// then with every future value.
    pub fn bind<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.bind_shared(Arc::new(watcher))
    }

    /// [`bind`](Signal::bind) with a shared watcher.
    pub fn bind_shared(&self, watcher: Watcher<T>) -> Subscription {
        if let Some(current) = self.get() {
            watcher(&current);
        }
        self.event.watch_shared(watcher)
    }

    /// Register a fault handler on the backing event.
    pub fn catch<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Fault) + Send + Sync + 'static,
    {
        self.event.catch(handler)
    }

    /// Remove a shared fault handler.
    pub fn uncatch(&self, handler: &Catcher) {
        self.event.uncatch(handler)
    }

    /// Stop following the sources of a derived signal. The cached value
    /// is kept.
    pub fn detach(&self) {
        self.upstream.unsubscribe();
    }

    // ------------------------------------------------------------------
    // Combinators
    // ------------------------------------------------------------------

    /// Emit zero or more values per source value.
    pub fn multimap<U, F>(&self, f: F) -> Signal<U>
    where
        U: Value,
        F: Fn(&T, &Emitter<U>) + Send + Sync + 'static,
    {
        ops::multimap(self, f)
    }

    /// A signal holding `f(value)`.
    pub fn map<U, F>(&self, f: F) -> Signal<U>
    where
        U: Value,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        ops::map(self, f)
    }

    /// A signal holding the value at a dotted property path.
    pub fn pluck(&self, path: &str) -> Result<Signal<serde_json::Value>, FlowError>
    where
        T: Serialize,
    {
        ops::pluck(self, path)
    }

    /// A signal holding whether the value structurally matches `shape`.
    pub fn map_matches(&self, shape: Shape) -> Signal<bool>
    where
        T: Serialize,
    {
        ops::map_matches(self, shape)
    }

    /// A signal holding the latest value that passed the predicate.
    pub fn filter(&self, predicate: impl Into<Predicate<T>>) -> Signal<T> {
        ops::filter(self, predicate)
    }

    /// A signal holding the latest truthy value.
    pub fn filter_truthy(&self) -> Signal<T>
    where
        T: Truthy,
    {
        ops::filter(self, Predicate::truthy())
    }

    /// A signal holding the latest value that failed the predicate.
    pub fn exclude(&self, predicate: impl Into<Predicate<T>>) -> Signal<T> {
        ops::exclude(self, predicate)
    }

    /// A signal that only updates when the value changes.
    pub fn unique(&self) -> Signal<T>
    where
        T: PartialEq,
    {
        ops::unique(self)
    }

    /// A signal that only updates when `eq` reports a change.
    pub fn unique_by<F>(&self, eq: F) -> Signal<T>
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        ops::unique_by(self, eq)
    }

    /// Unseeded running accumulation.
    ///
    /// The current value (or the first one to arrive) only seeds the
    /// accumulator, so the result stays empty until the next update.
    pub fn reduce<F>(&self, f: F) -> Signal<T>
    where
        F: Fn(&T, &T) -> T + Send + Sync + 'static,
    {
        ops::reduce(self, f)
    }

    /// Running accumulation from `seed`, applied to the current value and
    /// every later one.
    pub fn fold<A, F>(&self, seed: A, f: F) -> Signal<A>
    where
        A: Value,
        F: Fn(&A, &T) -> A + Send + Sync + 'static,
    {
        ops::fold(self, seed, f)
    }

    /// Running sum.
    pub fn sum(&self) -> Signal<T>
    where
        T: Add<Output = T> + From<u8>,
    {
        ops::sum(self)
    }

    /// Running product.
    pub fn product(&self) -> Signal<T>
    where
        T: Mul<Output = T> + From<u8>,
    {
        ops::product(self)
    }

    /// A signal that settles on the latest value after `delay` of quiet.
    pub fn debounce(&self, delay: Duration, scheduler: Arc<dyn Scheduler>) -> Signal<T> {
        ops::debounce(self, delay, scheduler)
    }

    /// A signal that takes on queued values whenever `gate` fires.
    pub fn sync<G: Value>(&self, gate: &Event<G>) -> Signal<T> {
        ops::sync(self, gate)
    }

    /// A signal following the inner source selected by the current value.
    pub fn flat_map<U, I, F>(&self, f: F) -> Signal<U>
    where
        U: Value,
        I: Functor<U> + Send + Sync + 'static,
        F: Fn(&T) -> I + Send + Sync + 'static,
    {
        ops::flat_map(self, f)
    }
}

impl<T: Value> Signal<Signal<T>> {
    /// Follow whichever inner signal is current.
    pub fn flatten(&self) -> Signal<T> {
        ops::flatten(self)
    }
}

impl<T: Value> Functor<T> for Signal<T> {
    type Lifted<U: Value> = Signal<U>;

    fn bind(&self, watcher: Watcher<T>) -> Subscription {
        self.bind_shared(watcher)
    }

    fn lift<U, W>(&self, wiring: W) -> Signal<U>
    where
        U: Value,
        W: FnOnce(Emitter<U>) -> Option<Subscription>,
    {
        Signal::derive(wiring)
    }
}

impl<T: Value> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            event: self.event.clone(),
            upstream: self.upstream.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Signal<T>
where
    T: Value + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.get())
            .field("event", &self.event)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
