//! Error Types
//!
//! Rill distinguishes two classes of failure:
//!
//! - [`FlowError`]: usage errors. A combinator was constructed with an
//!   argument it cannot work with (a shape that is not an object, an empty
//!   property path, no tokio runtime to schedule on). These are returned from
//!   the constructing call and are never retried.
//!
//! - [`Fault`]: data-channel errors. A fault travels through the same
//!   [`Pipe`](crate::stream::Pipe) as ordinary values but is delivered to the
//!   pipe's catch handlers instead of its watchers.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Usage errors raised while building a dataflow graph.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A structural matcher was built from something other than an object.
    #[error("shape matcher must be a JSON object, found {found}")]
    InvalidShape {
        /// The JSON kind that was supplied instead.
        found: &'static str,
    },

    /// A property path was empty or contained an empty segment.
    #[error("invalid property path {path:?}")]
    InvalidPath {
        /// The offending path.
        path: String,
    },

    /// A tokio-backed scheduler was requested outside of a tokio runtime.
    #[error("no tokio runtime available for scheduling")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// A tagged error value carried on a pipe's error channel.
///
/// Faults can only be built through [`Fault::new`] or [`Fault::from_error`],
/// so a payload value can never be mistaken for one.
#[derive(Clone, Error)]
#[error("{message}")]
pub struct Fault {
    message: Cow<'static, str>,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Fault {
    /// Create a fault with a human-readable message.
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an existing error, keeping it as the fault's source.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: Cow::Owned(error.to_string()),
            source: Some(Arc::new(error)),
        }
    }

    /// The fault's message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl PartialEq for Fault {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}
