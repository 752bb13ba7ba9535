//! Fan-in: `combine` and `join`.
//!
//! Both aggregate several signals into one. They differ in how they treat
//! sources that have no value yet:
//!
//! - [`combine`] starts right away from an empty aggregate and patches in
//!   each source's value as it arrives. Missing sources are simply absent.
//! - [`join`] stays empty until every source holds a value, then emits the
//!   full aggregate on every update of any source.
//!
//! The aggregate shape follows the input: a `Vec` of signals aggregates
//! into a `Vec`, an `IndexMap` of signals into an `IndexMap` with the
//! same keys.

use std::hash::Hash;

use indexmap::IndexMap;
use tracing::trace;

use super::cell::Cell;
use super::signal::Signal;
use crate::stream::{Subscription, Value};

/// A keyed collection of signals that can be aggregated.
pub trait Sources: Clone + Send + Sync + 'static {
    /// The value type of each source.
    type Item: Value;

    /// How a source is addressed within the collection.
    type Key: Clone + Send + Sync + 'static;

    /// The aggregate while some sources may still be missing.
    type Partial: Value + Default;

    /// The aggregate once every source holds a value.
    type Full: Value;

    /// Every source with its key, in collection order.
    fn entries(&self) -> Vec<(Self::Key, Signal<Self::Item>)>;

    /// The aggregate before any source has reported.
    fn blank(&self) -> Self::Partial;

    /// Record `value` for `key` in a partial aggregate.
    fn patch(partial: &mut Self::Partial, key: &Self::Key, value: Self::Item);

    /// The full aggregate, or `None` while any source is empty.
    fn snapshot(&self) -> Option<Self::Full>;
}

impl<T: Value> Sources for Vec<Signal<T>> {
    type Item = T;
    type Key = usize;
    type Partial = Vec<Option<T>>;
    type Full = Vec<T>;

    fn entries(&self) -> Vec<(usize, Signal<T>)> {
        self.iter().cloned().enumerate().collect()
    }

    fn blank(&self) -> Vec<Option<T>> {
        vec![None; self.len()]
    }

    fn patch(partial: &mut Vec<Option<T>>, key: &usize, value: T) {
        if partial.len() <= *key {
            partial.resize(*key + 1, None);
        }
        partial[*key] = Some(value);
    }

    fn snapshot(&self) -> Option<Vec<T>> {
        self.iter().map(Signal::get).collect()
    }
}

impl<K, T> Sources for IndexMap<K, Signal<T>>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Value,
{
    type Item = T;
    type Key = K;
    type Partial = IndexMap<K, T>;
    type Full = IndexMap<K, T>;

    fn entries(&self) -> Vec<(K, Signal<T>)> {
        self.iter()
            .map(|(key, signal)| (key.clone(), signal.clone()))
            .collect()
    }

    fn blank(&self) -> IndexMap<K, T> {
        IndexMap::with_capacity(self.len())
    }

    fn patch(partial: &mut IndexMap<K, T>, key: &K, value: T) {
        partial.insert(key.clone(), value);
    }

    fn snapshot(&self) -> Option<IndexMap<K, T>> {
        self.iter()
            .map(|(key, signal)| signal.get().map(|value| (key.clone(), value)))
            .collect()
    }
}

/// Aggregate the latest value of every source, as far as it is known.
///
/// The result holds the blank aggregate immediately and is patched slot by
/// slot as sources report. Sources that already hold a value report while
/// the result is being built.
///
/// ```rust
/// use indexmap::IndexMap;
/// use rill_core::reactive::{combine, Cell};
///
/// let a = Cell::new(1);
/// let b = Cell::empty();
///
/// let mut sources = IndexMap::new();
/// sources.insert("a", a.signal());
/// sources.insert("b", b.signal());
///
/// let combined = combine(&sources);
/// assert_eq!(combined.get().unwrap().len(), 1);
///
/// b.set(2);
/// assert_eq!(combined.get().unwrap()["b"], 2);
/// ```
pub fn combine<S: Sources>(sources: &S) -> Signal<S::Partial> {
    let state = Cell::new(sources.blank());

    let subscriptions: Vec<Subscription> = sources
        .entries()
        .into_iter()
        .map(|(key, signal)| {
            let emit = state.emitter();
            let current = state.signal();
            signal.bind(move |value: &S::Item| {
                let mut next = current.get().unwrap_or_default();
                S::patch(&mut next, &key, value.clone());
                emit.emit(next);
            })
        })
        .collect();

    trace!(sources = subscriptions.len(), "combine bound");
    state.signal().with_upstream(Subscription::all(subscriptions))
}

/// Aggregate the latest value of every source once all of them have one.
///
/// The result is empty until every source holds a value. From then on it
/// emits the full aggregate whenever any source updates.
pub fn join<S: Sources>(sources: &S) -> Signal<S::Full> {
    let state = Cell::empty();

    let subscriptions: Vec<Subscription> = sources
        .entries()
        .into_iter()
        .map(|(_, signal)| {
            let emit = state.emitter();
            let all = sources.clone();
            signal.bind(move |_: &S::Item| {
                if let Some(full) = all.snapshot() {
                    emit.emit(full);
                }
            })
        })
        .collect();

    trace!(sources = subscriptions.len(), "join bound");
    state.signal().with_upstream(Subscription::all(subscriptions))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
