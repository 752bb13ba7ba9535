//! Reactive Values
//!
//! This module implements the pull side of Rill: signals, cells, and the
//! fan-in builders that aggregate several signals into one.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] follows an event and caches the latest value it saw. The
//! value can be read with `get` at any time; a signal that has not seen a
//! value yet is empty. Binding a signal replays its current value before
//! delivering updates.
//!
//! ## Cells
//!
//! A [`Cell`] is a signal you can write to. It owns a private pipe and
//! exposes `set` and `update`. Hand out `cell.signal()` for read-only
//! access.
//!
//! ## Fan-in
//!
//! [`combine`] and [`join`] aggregate a collection of signals (a `Vec` or an
//! `IndexMap`) into a single signal. `combine` is available immediately and
//! fills in as sources report; `join` waits until every source has a value.
//!
//! # Implementation Notes
//!
//! Combinators on signals reuse the algebra in [`crate::ops`]. Each derived
//! signal is backed by its own cell and stays bound to its sources until
//! [`Signal::detach`] is called.

mod cell;
mod fan_in;
mod signal;

pub use cell::Cell;
pub use fan_in::{combine, join, Sources};
pub use signal::Signal;
