//! Event Streams
//!
//! This module implements the push side of Rill: pipes, events, and the
//! transform engine every derived event is built on.
//!
//! # Concepts
//!
//! ## Pipes
//!
//! A [`Pipe`] owns an ordered list of watchers. `fire` calls every watcher
//! synchronously, in the order they registered. There is no buffering and
//! no async hand-off: when `fire` returns, the whole downstream chain has
//! run.
//!
//! ## Events
//!
//! An [`Event`] is the read-only view of a watchable source. It can be
//! watched and unwatched but not fired. External push sources become events
//! by implementing [`Source`] or through [`Event::adapter`].
//!
//! ## Transforms
//!
//! [`Event::transform`] is the single construction primitive for derived
//! events. The wiring closure receives an [`Emitter`] for a private pipe and
//! returns the teardown for its upstream subscription. The engine releases
//! that subscription once nobody watches the derived event and no explicit
//! [`retain`](Event::retain) is outstanding.

mod event;
mod lifecycle;
mod pipe;
mod subscription;

use std::sync::Arc;

use crate::error::Fault;

pub use event::{Emitter, Event, Source};
pub use lifecycle::{should_release, Lifecycle};
pub use pipe::Pipe;
pub use subscription::{Subscription, WatcherId};

/// Bound shared by every value that flows through a pipe.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Value for T {}

/// A shared watcher callback.
pub type Watcher<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A shared fault handler.
pub type Catcher = Arc<dyn Fn(&Fault) + Send + Sync>;
