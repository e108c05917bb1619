//! # Monads
//!
//! A [`Monad<T>`] describes a computation that eventually succeeds with a
//! `T` or fails with a [`TaskError`]. Nothing runs when a monad or a
//! combinator is built; [`Monad::run`] hands out the block that does the
//! work, to be scheduled on an executor or called from another block.
//!
//! ```text
//!   Pending ──run()──► Running ──block completes──► Succeeded(T)
//!                          │                    └──► Failed(TaskError)
//!                          └──block dropped early──► Failed(Cancelled)
//! ```
//!
//! The outcome reported through [`Return`] is staged while the block runs
//! and published only when the block completes, so a half-finished monad
//! never exposes a result.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use cadence_core::{block_on, Executor, Monad};
//!
//! let answer = Monad::ok(42).then(|x| Monad::ok(x * 2)).map(|y| y.to_string());
//!
//! let mut executor = Executor::new();
//! executor.spawn(answer.run());
//! block_on(&mut executor, Duration::from_millis(16));
//!
//! assert_eq!(answer.result().as_deref(), Some("84"));
//! ```

mod bind;
mod concurrent;
mod threaded;

pub use concurrent::{when_all, when_all2, when_all3};
pub use threaded::{threaded, CancelToken};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::block::{self, Block, BlockExt, BoxBlock, Yield};
use crate::error::{TaskError, TaskResult};

type Factory<T> = Box<dyn FnOnce(Return<T>) -> BoxBlock>;

/// Observable lifecycle of a monad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MonadState {
    /// Built but not yet run.
    Pending,
    /// Its block has been handed out and has not completed.
    Running,
    /// Completed with a value.
    Succeeded,
    /// Completed with an error.
    Failed,
}

impl MonadState {
    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

enum Slot<T> {
    Pending(Factory<T>),
    Running { staged: Option<TaskResult<T>> },
    /// `None` once the value has been taken by a reader.
    Succeeded(Option<T>),
    Failed(TaskError),
}

struct Inner<T> {
    slot: RefCell<Slot<T>>,
}

impl<T> Inner<T> {
    fn state(&self) -> MonadState {
        match &*self.slot.borrow() {
            Slot::Pending(_) => MonadState::Pending,
            Slot::Running { .. } => MonadState::Running,
            Slot::Succeeded(_) => MonadState::Succeeded,
            Slot::Failed(_) => MonadState::Failed,
        }
    }

    fn stage(&self, outcome: TaskResult<T>) {
        match &mut *self.slot.borrow_mut() {
            Slot::Running { staged } if staged.is_none() => *staged = Some(outcome),
            Slot::Running { .. } => {
                tracing::warn!("monad outcome reported twice; keeping the first");
            }
            _ => {
                tracing::warn!("monad outcome reported outside of its run; ignored");
            }
        }
    }

    /// Moves the staged outcome into the terminal slot.
    fn publish(&self) {
        let mut slot = self.slot.borrow_mut();
        if let Slot::Running { staged } = &mut *slot {
            *slot = match staged.take() {
                Some(Ok(value)) => Slot::Succeeded(Some(value)),
                Some(Err(error)) => Slot::Failed(error),
                None => Slot::Failed(TaskError::NoOutcome),
            };
        }
    }

    /// Marks a running monad as cancelled.
    fn abandon(&self) {
        let mut slot = self.slot.borrow_mut();
        if matches!(&*slot, Slot::Running { .. }) {
            tracing::debug!("monad released before completing");
            *slot = Slot::Failed(TaskError::Cancelled);
        }
    }
}

/// Handle to a computation producing `T` or a [`TaskError`].
///
/// Cloning shares the same computation and outcome slot.
pub struct Monad<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Monad<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Monad<T> {
    /// Wraps a block factory. The factory is called once, on [`Monad::run`],
    /// with the [`Return`] sink the block reports its outcome through.
    pub fn new<F, B>(factory: F) -> Self
    where
        F: FnOnce(Return<T>) -> B + 'static,
        B: Block + 'static,
    {
        let factory: Factory<T> = Box::new(move |ret| factory(ret).boxed());
        Self::with_slot(Slot::Pending(factory))
    }

    /// An already-succeeded monad. Running it takes no steps.
    pub fn ok(value: T) -> Self {
        Self::with_slot(Slot::Succeeded(Some(value)))
    }

    /// An already-failed monad. Running it takes no steps.
    pub fn err(error: impl Into<TaskError>) -> Self {
        Self::with_slot(Slot::Failed(error.into()))
    }

    /// An already-completed monad holding `outcome`.
    pub fn from_result(outcome: TaskResult<T>) -> Self {
        match outcome {
            Ok(value) => Self::ok(value),
            Err(error) => Self::err(error),
        }
    }

    fn with_slot(slot: Slot<T>) -> Self {
        Self {
            inner: Rc::new(Inner {
                slot: RefCell::new(slot),
            }),
        }
    }

    /// Hands out the block that performs the computation.
    ///
    /// A monad that already completed yields an empty block, so completed
    /// values compose without taking any steps. A monad that is running
    /// elsewhere yields a block that suspends until that run settles; the
    /// computation itself is never started twice.
    #[must_use = "the returned block does nothing unless it is scheduled"]
    pub fn run(&self) -> BoxBlock {
        let mut slot = self.inner.slot.borrow_mut();
        let factory = match std::mem::replace(&mut *slot, Slot::Running { staged: None }) {
            Slot::Pending(factory) => factory,
            Slot::Running { staged } => {
                *slot = Slot::Running { staged };
                tracing::trace!("monad already running; waiting for it to settle");
                return Box::new(AwaitSettled {
                    inner: Rc::clone(&self.inner),
                });
            }
            terminal => {
                *slot = terminal;
                return block::empty().boxed();
            }
        };
        drop(slot);

        let body = factory(Return {
            inner: Rc::clone(&self.inner),
        });
        Box::new(MonadBlock {
            body: Some(body),
            inner: Rc::clone(&self.inner),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> MonadState {
        self.inner.state()
    }

    /// Returns true once the monad succeeded or failed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// The error, if the monad failed.
    #[must_use]
    pub fn error(&self) -> Option<TaskError> {
        match &*self.inner.slot.borrow() {
            Slot::Failed(error) => Some(error.clone()),
            _ => None,
        }
    }

    /// Moves the value out, if the monad succeeded and nobody took it yet.
    pub fn take_result(&self) -> Option<T> {
        match &mut *self.inner.slot.borrow_mut() {
            Slot::Succeeded(value) => value.take(),
            _ => None,
        }
    }

    /// Moves the outcome out. Errors stay readable after being taken.
    pub fn take_outcome(&self) -> Option<TaskResult<T>> {
        match &mut *self.inner.slot.borrow_mut() {
            Slot::Succeeded(value) => value.take().map(Ok),
            Slot::Failed(error) => Some(Err(error.clone())),
            _ => None,
        }
    }
}

impl<T: Clone + 'static> Monad<T> {
    /// Outcome of a completed monad, for the stage that consumes it.
    ///
    /// Other handles keep reading the same outcome. The value is only moved
    /// out when this is the last handle, where nobody can observe the move.
    pub(crate) fn settled(&self) -> TaskResult<T> {
        let outcome = if Rc::strong_count(&self.inner) == 1 {
            self.take_outcome()
        } else {
            self.outcome()
        };
        outcome.unwrap_or(Err(TaskError::NoOutcome))
    }

    /// A copy of the value, if the monad succeeded.
    #[must_use]
    pub fn result(&self) -> Option<T> {
        match &*self.inner.slot.borrow() {
            Slot::Succeeded(value) => value.clone(),
            _ => None,
        }
    }

    /// A copy of the outcome, once the monad completed.
    #[must_use]
    pub fn outcome(&self) -> Option<TaskResult<T>> {
        match &*self.inner.slot.borrow() {
            Slot::Succeeded(value) => value.clone().map(Ok),
            Slot::Failed(error) => Some(Err(error.clone())),
            _ => None,
        }
    }
}

impl<T> fmt::Debug for Monad<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monad")
            .field("state", &self.inner.state())
            .finish()
    }
}

/// The sink a monad's block reports its outcome through.
///
/// `accept` and `fail` are terminal and mutually exclusive: the first call
/// wins and later calls are logged and ignored.
pub struct Return<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Return<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Return<T> {
    /// Reports success.
    pub fn accept(&self, value: T) {
        self.inner.stage(Ok(value));
    }

    /// Reports failure.
    pub fn fail(&self, error: impl Into<TaskError>) {
        self.inner.stage(Err(error.into()));
    }

    /// Reports either outcome.
    pub fn complete(&self, outcome: TaskResult<T>) {
        self.inner.stage(outcome);
    }
}

impl<T> fmt::Debug for Return<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Return")
            .field("state", &self.inner.state())
            .finish()
    }
}

/// Calls the user block, then publishes its staged outcome.
struct MonadBlock<T> {
    body: Option<BoxBlock>,
    inner: Rc<Inner<T>>,
}

impl<T> Block for MonadBlock<T> {
    fn step(&mut self, _delta: Duration) -> Option<Yield> {
        if let Some(body) = self.body.take() {
            return Some(Yield::Call(body));
        }
        self.inner.publish();
        None
    }
}

impl<T> Drop for MonadBlock<T> {
    fn drop(&mut self) {
        // Drop the body first so its release hooks run before the state flips.
        drop(self.body.take());
        self.inner.abandon();
    }
}

/// Waits on a monad some other block is running.
struct AwaitSettled<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Block for AwaitSettled<T> {
    fn step(&mut self, _delta: Duration) -> Option<Yield> {
        (!self.inner.state().is_terminal()).then_some(Yield::Suspend)
    }
}
