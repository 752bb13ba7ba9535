//! Shared combinators.
//!
//! Each function takes any [`Functor`] and returns its lifted node. State
//! that a combinator keeps between values (the previous value for
//! `unique`, the accumulator for `reduce`) lives behind a mutex that is
//! never held while emitting.

use std::ops::{Add, Mul};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use super::predicate::{Predicate, PropertyPath, Shape};
use super::Functor;
use crate::error::FlowError;
use crate::scheduler::Scheduler;
use crate::stream::{Emitter, Event, Subscription, Value};

/// Emit zero, one or many values for every source value.
pub fn multimap<T, U, S, F>(functor: &S, f: F) -> S::Lifted<U>
where
    T: Value,
    U: Value,
    S: Functor<T>,
    F: Fn(&T, &Emitter<U>) + Send + Sync + 'static,
{
    functor.lift(move |emit| Some(functor.bind(Arc::new(move |value: &T| f(value, &emit)))))
}

/// Emit `f(value)` for every source value.
pub fn map<T, U, S, F>(functor: &S, f: F) -> S::Lifted<U>
where
    T: Value,
    U: Value,
    S: Functor<T>,
    F: Fn(&T) -> U + Send + Sync + 'static,
{
    multimap::<T, U, S, _>(functor, move |value, emit| emit.emit(f(value)))
}

/// Emit the JSON value found at a dotted property path of every source
/// value. Missing paths yield `null`.
pub fn pluck<T, S>(functor: &S, path: &str) -> Result<S::Lifted<serde_json::Value>, FlowError>
where
    T: Value + Serialize,
    S: Functor<T>,
{
    let path = PropertyPath::parse(path)?;
    Ok(multimap::<T, serde_json::Value, S, _>(functor, move |value: &T, emit| {
        match serde_json::to_value(value) {
            Ok(json) => emit.emit(path.select(&json)),
            Err(err) => debug!(%err, "value could not be encoded for pluck"),
        }
    }))
}

/// Emit whether each source value structurally matches `shape`.
pub fn map_matches<T, S>(functor: &S, shape: Shape) -> S::Lifted<bool>
where
    T: Value + Serialize,
    S: Functor<T>,
{
    map::<T, bool, S, _>(functor, move |value: &T| shape.matches(value))
}

/// Pass through values for which `predicate` holds.
pub fn filter<T, S, P>(functor: &S, predicate: P) -> S::Lifted<T>
where
    T: Value,
    S: Functor<T>,
    P: Into<Predicate<T>>,
{
    let predicate = predicate.into();
    multimap::<T, _, S, _>(functor, move |value: &T, emit| {
        if predicate.test(value) {
            emit.emit(value.clone());
        }
    })
}

/// Pass through values for which `predicate` does not hold.
pub fn exclude<T, S, P>(functor: &S, predicate: P) -> S::Lifted<T>
where
    T: Value,
    S: Functor<T>,
    P: Into<Predicate<T>>,
{
    let predicate = predicate.into();
    multimap::<T, _, S, _>(functor, move |value: &T, emit| {
        if !predicate.test(value) {
            emit.emit(value.clone());
        }
    })
}

/// Suppress values equal to the previous accepted value.
pub fn unique<T, S>(functor: &S) -> S::Lifted<T>
where
    T: Value + PartialEq,
    S: Functor<T>,
{
    unique_by::<T, S, _>(functor, |a: &T, b: &T| a == b)
}

/// Suppress values that `eq` considers equal to the previous accepted value.
///
/// Only the immediately preceding accepted value is compared, not the
/// whole history.
pub fn unique_by<T, S, F>(functor: &S, eq: F) -> S::Lifted<T>
where
    T: Value,
    S: Functor<T>,
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    let last: Mutex<Option<T>> = Mutex::new(None);
    multimap::<T, _, S, _>(functor, move |value: &T, emit| {
        let accepted = {
            let mut last = last.lock();
            let repeat = last.as_ref().map_or(false, |previous| eq(previous, value));
            if !repeat {
                *last = Some(value.clone());
            }
            !repeat
        };
        if accepted {
            emit.emit(value.clone());
        }
    })
}

/// Unseeded running accumulation.
///
/// The first value only seeds the accumulator. Every later value emits
/// `f(acc, value)`, which becomes the new accumulator.
pub fn reduce<T, S, F>(functor: &S, f: F) -> S::Lifted<T>
where
    T: Value,
    S: Functor<T>,
    F: Fn(&T, &T) -> T + Send + Sync + 'static,
{
    let acc: Mutex<Option<T>> = Mutex::new(None);
    multimap::<T, _, S, _>(functor, move |value: &T, emit| {
        let previous = acc.lock().clone();
        match previous {
            None => *acc.lock() = Some(value.clone()),
            Some(previous) => {
                let next = f(&previous, value);
                *acc.lock() = Some(next.clone());
                emit.emit(next);
            }
        }
    })
}

/// Seeded running accumulation. Every value, including the first, emits.
pub fn fold<T, A, S, F>(functor: &S, seed: A, f: F) -> S::Lifted<A>
where
    T: Value,
    A: Value,
    S: Functor<T>,
    F: Fn(&A, &T) -> A + Send + Sync + 'static,
{
    let acc = Mutex::new(seed);
    multimap::<T, _, S, _>(functor, move |value: &T, emit| {
        let previous = acc.lock().clone();
        let next = f(&previous, value);
        *acc.lock() = next.clone();
        emit.emit(next);
    })
}

/// Running sum, starting from zero.
pub fn sum<T, S>(functor: &S) -> S::Lifted<T>
where
    T: Value + Add<Output = T> + From<u8>,
    S: Functor<T>,
{
    fold::<T, T, S, _>(functor, T::from(0), |a: &T, b: &T| a.clone() + b.clone())
}

/// Running product, starting from one.
pub fn product<T, S>(functor: &S) -> S::Lifted<T>
where
    T: Value + Mul<Output = T> + From<u8>,
    S: Functor<T>,
{
    fold::<T, T, S, _>(functor, T::from(1), |a: &T, b: &T| a.clone() * b.clone())
}

/// Buffer source values and flush them, in arrival order, each time `gate`
/// fires. A gate firing with an empty buffer emits nothing.
pub fn sync<T, G, S>(functor: &S, gate: &Event<G>) -> S::Lifted<T>
where
    T: Value,
    G: Value,
    S: Functor<T>,
{
    functor.lift(move |emit| {
        let queue: Arc<Mutex<Vec<T>>> = Arc::new(Mutex::new(Vec::new()));

        let incoming = Arc::clone(&queue);
        let data = functor.bind(Arc::new(move |value: &T| {
            incoming.lock().push(value.clone());
        }));

        let flush = gate.watch(move |_| {
            let batch = std::mem::take(&mut *queue.lock());
            if !batch.is_empty() {
                trace!(values = batch.len(), "sync gate flushed");
            }
            for value in batch {
                emit.emit(value);
            }
        });

        Some(Subscription::all([data, flush]))
    })
}

struct Debounce {
    generation: u64,
    pending: Option<Subscription>,
}

/// Emit the latest value once the source has been quiet for `delay`.
///
/// Each new value cancels the pending emission and schedules a fresh one,
/// so only the last value of a burst comes through.
pub fn debounce<T, S>(functor: &S, delay: Duration, scheduler: Arc<dyn Scheduler>) -> S::Lifted<T>
where
    T: Value,
    S: Functor<T>,
{
    functor.lift(move |emit| {
        let state = Arc::new(Mutex::new(Debounce {
            generation: 0,
            pending: None,
        }));

        let incoming = Arc::clone(&state);
        let upstream = functor.bind(Arc::new(move |value: &T| {
            let (generation, previous) = {
                let mut state = incoming.lock();
                state.generation += 1;
                (state.generation, state.pending.take())
            };
            if let Some(previous) = previous {
                debug!("debounce rescheduled");
                previous.unsubscribe();
            }

            let value = value.clone();
            let emit = emit.clone();
            let timer_state = Arc::clone(&incoming);
            let timer = scheduler.schedule(
                delay,
                Box::new(move || {
                    let current = {
                        let mut state = timer_state.lock();
                        let current = state.generation == generation;
                        if current {
                            state.pending = None;
                        }
                        current
                    };
                    if current {
                        emit.emit(value);
                    }
                }),
            );

            let superseded = {
                let mut state = incoming.lock();
                if state.generation == generation {
                    state.pending = Some(timer.clone());
                    false
                } else {
                    true
                }
            };
            if superseded {
                timer.unsubscribe();
            }
        }));

        Some(Subscription::new(move || {
            upstream.unsubscribe();
            let pending = {
                let mut state = state.lock();
                state.generation += 1;
                state.pending.take()
            };
            if let Some(pending) = pending {
                pending.unsubscribe();
            }
        }))
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
