//! Writable signals.

use std::ops::Deref;

use super::signal::Signal;
use crate::error::Fault;
use crate::stream::{Emitter, Pipe, Value};

/// A signal with a private pipe that can be set directly.
///
/// The cell owns the write side. Hand out [`signal`](Cell::signal) to give
/// read-only access.
///
/// ```rust
/// use rill_core::reactive::Cell;
///
/// let name = Cell::new("ada".to_string());
/// let upper = name.map(|s: &String| s.to_uppercase());
///
/// name.set("grace".to_string());
/// assert_eq!(upper.get().as_deref(), Some("GRACE"));
/// ```
pub struct Cell<T: Value> {
    pipe: Pipe<T>,
    signal: Signal<T>,
}

impl<T: Value> Cell<T> {
    /// A cell holding `value`.
    pub fn new(value: T) -> Self {
        Self::with_initial(Some(value))
    }

    /// A cell with no value yet.
    pub fn empty() -> Self {
        Self::with_initial(None)
    }

    fn with_initial(initial: Option<T>) -> Self {
        let pipe = Pipe::new();
        let signal = Signal::from_event(initial, pipe.event());
        Self { pipe, signal }
    }

    /// Store `value` and notify watchers. Watchers run even if the value is
    /// unchanged.
    pub fn set(&self, value: T) {
        self.pipe.fire(value);
    }

    /// Set the cell to `f(current)`.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(Option<T>) -> T,
    {
        let next = f(self.signal.get());
        self.set(next);
    }

    /// Raise a fault on the cell's fault channel. The value is unchanged.
    pub fn raise(&self, fault: Fault) {
        self.pipe.raise(fault);
    }

    /// A read-only handle to this cell.
    pub fn signal(&self) -> Signal<T> {
        self.signal.clone()
    }

    pub(crate) fn emitter(&self) -> Emitter<T> {
        Emitter::new(self.pipe.clone())
    }
}

impl<T: Value> Deref for Cell<T> {
    type Target = Signal<T>;

    fn deref(&self) -> &Signal<T> {
        &self.signal
    }
}

impl<T> std::fmt::Debug for Cell<T>
where
    T: Value + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("value", &self.signal.get())
            .field("watchers", &self.pipe.count_watchers())
            .finish()
    }
}
