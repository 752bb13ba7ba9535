//! Timers
//!
//! Delivery in Rill is synchronous; the only time-based combinator is
//! `debounce`, which needs to run a task later. It does so through the
//! [`Scheduler`] trait so the host decides where time comes from.
//!
//! Two schedulers are provided:
//!
//! - [`TokioScheduler`] spawns a sleeping task on a tokio runtime.
//! - [`ManualScheduler`] keeps a virtual clock that only moves when
//!   [`advance`](ManualScheduler::advance) is called. Tasks run on the
//!   calling thread, in deadline order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::trace;

use crate::error::FlowError;
use crate::stream::Subscription;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Runs tasks after a delay.
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has passed. Unsubscribing the returned
    /// handle before then cancels the task.
    fn schedule(&self, delay: Duration, task: Task) -> Subscription;
}

/// A scheduler backed by a tokio runtime.
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Use the runtime the caller is running on.
    pub fn current() -> Result<Self, FlowError> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Use the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> Subscription {
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        Subscription::new(move || join.abort())
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler").finish_non_exhaustive()
    }
}

struct Clock {
    now: Duration,
    seq: u64,
    /// Keyed by deadline, then by scheduling order.
    queue: BTreeMap<(Duration, u64), Task>,
}

/// A virtual clock for deterministic hosts and tests.
///
/// Clones share the same clock.
///
/// ```rust
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use rill_core::scheduler::{ManualScheduler, Scheduler};
///
/// let clock = ManualScheduler::new();
/// let ran = Arc::new(AtomicBool::new(false));
/// let ran_clone = ran.clone();
/// clock.schedule(Duration::from_secs(1), Box::new(move || ran_clone.store(true, Ordering::SeqCst)));
///
/// clock.advance(Duration::from_millis(999));
/// assert!(!ran.load(Ordering::SeqCst));
/// clock.advance(Duration::from_millis(1));
/// assert!(ran.load(Ordering::SeqCst));
/// ```
#[derive(Clone)]
pub struct ManualScheduler {
    clock: Arc<Mutex<Clock>>,
}

impl ManualScheduler {
    /// A clock at time zero with nothing scheduled.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(Mutex::new(Clock {
                now: Duration::ZERO,
                seq: 0,
                queue: BTreeMap::new(),
            })),
        }
    }

    /// Time elapsed on this clock.
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.clock.lock().queue.len()
    }

    /// Move the clock forward by `by`, running every task that falls due.
    ///
    /// Tasks run outside the clock's lock, so a task may schedule or cancel
    /// other tasks. Anything it schedules within the window also runs.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.lock().now + by;

        loop {
            let due = {
                let mut clock = self.clock.lock();
                let next = clock
                    .queue
                    .keys()
                    .next()
                    .copied()
                    .filter(|(deadline, _)| *deadline <= target);
                match next {
                    Some(key) => {
                        clock.now = key.0;
                        clock.queue.remove(&key)
                    }
                    None => None,
                }
            };

            match due {
                Some(task) => task(),
                None => break,
            }
        }

        self.clock.lock().now = target;
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> Subscription {
        let key = {
            let mut clock = self.clock.lock();
            clock.seq += 1;
            let key = (clock.now + delay, clock.seq);
            clock.queue.insert(key, task);
            key
        };
        trace!(deadline = ?key.0, "task scheduled");

        let clock = Arc::downgrade(&self.clock);
        Subscription::new(move || {
            if let Some(clock) = clock.upgrade() {
                clock.lock().queue.remove(&key);
            }
        })
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = self.clock.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &clock.now)
            .field("pending", &clock.queue.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
