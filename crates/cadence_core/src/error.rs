//! # Task Error Types
//!
//! Failures that travel through the monad layer as values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors a cooperative computation can finish with.
///
/// Cloning is cheap: a single failure is often observed by several
/// combinators (the component that failed, the `when_all` around it, and a
/// `catch` further out).
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// Domain code reported a failure through `Return::fail`.
    #[error("{0}")]
    Failed(String),

    /// An error value produced by some other library.
    #[error("{0}")]
    External(Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// A binder, mapper, or handler panicked while building the next step.
    #[error("continuation panicked: {0}")]
    Panicked(String),

    /// The function running on a background thread panicked.
    #[error("background worker panicked: {0}")]
    WorkerPanicked(String),

    /// The background thread went away without reporting anything.
    #[error("background worker vanished before reporting a result")]
    WorkerLost,

    /// The computation was disposed before it finished.
    #[error("computation was cancelled before it finished")]
    Cancelled,

    /// The computation finished without accepting a value or failing.
    #[error("computation finished without producing an outcome")]
    NoOutcome,

    /// A blocking driver gave up after the given number of ticks.
    #[error("tick budget exhausted after {0} ticks")]
    TickBudgetExhausted(u64),
}

impl TaskError {
    /// Creates a domain failure from a message.
    #[must_use]
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }

    /// Wraps an arbitrary error value.
    #[must_use]
    pub fn external<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::External(Arc::new(error))
    }

    /// Returns true if this error came from cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Builds a `Panicked` error from a caught panic payload.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::Panicked(panic_message(payload))
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self::Failed(message.to_owned())
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        Self::Failed(message)
    }
}

/// Extracts the human-readable part of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Result type for cooperative computations.
pub type TaskResult<T> = Result<T, TaskError>;
