//! Rill Core
//!
//! This crate provides the core of the Rill dataflow library. It implements:
//!
//! - Push streams: pipes, events, and the transform engine behind every
//!   derived event
//! - A fault channel carried alongside values on every stream
//! - Reactive values: signals and writable cells
//! - A combinator algebra shared by events and signals
//! - Fan-in builders that aggregate several signals
//!
//! Delivery is synchronous and depth-first. When `fire` returns, every
//! watcher downstream has run.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `stream`: pipes, events, subscriptions and derived-node lifecycle
//! - `ops`: combinators, predicates and structural matching
//! - `reactive`: signals, cells, `combine` and `join`
//! - `scheduler`: timers for `debounce`
//! - `error`: the fault value and construction errors
//!
//! # Example
//!
//! ```rust
//! use rill_core::{Cell, Pipe};
//!
//! // A push stream
//! let clicks = Pipe::new();
//! let doubled = clicks.event().map(|x: &i32| x * 2);
//! doubled.watch(|x| println!("doubled: {x}"));
//! clicks.fire(21);
//!
//! // A reactive value
//! let count = Cell::new(1);
//! let label = count.map(|n: &i32| format!("{n} items"));
//! count.set(3);
//! assert_eq!(label.get().as_deref(), Some("3 items"));
//! ```

pub mod error;
pub mod ops;
pub mod reactive;
pub mod scheduler;
pub mod stream;

pub use error::{Fault, FlowError};
pub use ops::{Functor, Predicate, Shape, Truthy};
pub use reactive::{combine, join, Cell, Signal, Sources};
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};
pub use stream::{Emitter, Event, Pipe, Source, Subscription};
