//! Combinator Algebra
//!
//! Every combinator here is written once, against the [`Functor`]
//! capability, and works for both primitives:
//!
//! - on an [`Event`](crate::stream::Event) it produces another event, built
//!   by the transform engine and released when unobserved;
//! - on a [`Signal`](crate::reactive::Signal) it produces another signal,
//!   backed by a fresh cell. Because binding a signal replays its current
//!   value, signal combinators compute eagerly.
//!
//! The functions in this module are the static call form. `Event` and
//! `Signal` expose the same combinators as methods, so
//! `ops::map(&event, f)` and `event.map(f)` are interchangeable.

mod common;
mod predicate;
mod switch;

use crate::stream::{Emitter, Subscription, Value, Watcher};

pub use common::{
    debounce, exclude, filter, fold, map, map_matches, multimap, pluck, product, reduce, sum,
    sync, unique, unique_by,
};
pub use predicate::{Predicate, PropertyPath, Shape, Truthy};
pub use switch::{flat_map, flatten};

/// The capability shared by events and signals.
pub trait Functor<T: Value> {
    /// What a combinator over this functor produces.
    type Lifted<U: Value>;

    /// Watch this functor. Signals replay their current value first.
    fn bind(&self, watcher: Watcher<T>) -> Subscription;

    /// Build a derived node of the same kind. `wiring` runs once, receives
    /// the node's emitter and returns the upstream teardown.
    fn lift<U, W>(&self, wiring: W) -> Self::Lifted<U>
    where
        U: Value,
        W: FnOnce(Emitter<U>) -> Option<Subscription>;
}
