//! Switching combinators.
//!
//! `flat_map` and `flatten` keep exactly one live inner subscription. When
//! the outer source moves on, the old inner subscription is cancelled
//! before the new one is made, so a value fired on a stale inner source is
//! never forwarded.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::Functor;
use crate::reactive::Signal;
use crate::stream::{Subscription, Value};

/// Follow the inner source that `f` selects for the latest outer value.
///
/// Switching away from a derived inner event removes its only watcher, which
/// releases that node for good. Selecting the same derived event again
/// binds to a node that no longer emits, so `f` should build a fresh derived
/// event per selection (or hand out retained ones) when sources are
/// revisited. Pipes, adapters and signals are unaffected.
pub fn flat_map<T, U, S, I, F>(functor: &S, f: F) -> S::Lifted<U>
where
    T: Value,
    U: Value,
    S: Functor<T>,
    I: Functor<U> + Send + Sync + 'static,
    F: Fn(&T) -> I + Send + Sync + 'static,
{
    functor.lift(move |emit| {
        let current: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&current);
        let outer = functor.bind(Arc::new(move |value: &T| {
            let inner = f(value);

            let previous = slot.lock().take();
            if let Some(previous) = previous {
                trace!("switching inner source");
                previous.unsubscribe();
            }

            let forward = emit.clone();
            let subscription = inner.bind(Arc::new(move |value: &U| forward.emit(value.clone())));

            // A reentrant switch during `bind` may already have installed a
            // newer inner source; keep that one.
            let stale = {
                let mut slot = slot.lock();
                if slot.is_none() {
                    *slot = Some(subscription.clone());
                    false
                } else {
                    true
                }
            };
            if stale {
                subscription.unsubscribe();
            }
        }));

        Some(Subscription::new(move || {
            outer.unsubscribe();
            let inner = current.lock().take();
            if let Some(inner) = inner {
                inner.unsubscribe();
            }
        }))
    })
}

/// Collapse a signal of signals into a signal that follows whichever inner
/// signal is current.
///
/// Switching to a new inner signal picks up its current value, then every
/// value it emits afterwards.
pub fn flatten<T: Value>(signal: &Signal<Signal<T>>) -> Signal<T> {
    flat_map::<Signal<T>, T, _, _, _>(signal, |inner: &Signal<T>| inner.clone())
}
