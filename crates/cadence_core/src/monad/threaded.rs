//! Background-thread monads.
//!
//! A threaded monad runs a blocking function on its own OS thread. The
//! cooperative side only polls a channel once per tick. Cancelling the
//! monad raises its [`CancelToken`] and detaches the thread; nothing waits
//! for the function to notice.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, TryRecvError};

use super::{Monad, Return};
use crate::block::{Block, Yield};
use crate::error::{panic_message, TaskError, TaskResult};

const WORKER_THREAD_NAME: &str = "cadence-worker";

/// Cooperative cancellation flag handed to a background function.
///
/// Long-running functions should check it between units of work and return
/// early once it is set. Their result is discarded either way.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the owning monad was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// Runs `work` on a background thread, started on the monad's first step.
///
/// The monad completes with whatever `work` returns. A panic inside `work`
/// becomes [`TaskError::WorkerPanicked`]; a thread that could not be spawned
/// fails the monad with the spawn error.
///
/// ```rust
/// use std::time::Duration;
/// use cadence_core::{block_on, threaded, Executor};
///
/// let sum = threaded(|_cancel| Ok((1..=100_u32).sum::<u32>()));
/// let mut executor = Executor::new();
/// executor.spawn(sum.run());
/// block_on(&mut executor, Duration::from_millis(1));
/// assert_eq!(sum.result(), Some(5050));
/// ```
pub fn threaded<T, F>(work: F) -> Monad<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> TaskResult<T> + Send + 'static,
{
    Monad::new(move |ret| Worker {
        stage: WorkerStage::Idle(work),
        ret,
    })
}

enum WorkerStage<F, T> {
    Idle(F),
    Waiting {
        outcome: Receiver<TaskResult<T>>,
        token: CancelToken,
    },
    Done,
}

struct Worker<F, T> {
    stage: WorkerStage<F, T>,
    ret: Return<T>,
}

impl<F, T> Worker<F, T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> TaskResult<T> + Send + 'static,
{
    fn start(&mut self, work: F) -> Option<Yield> {
        let token = CancelToken::new();
        let (sender, outcome) = bounded(1);
        let worker_token = token.clone();

        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_owned())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| work(&worker_token)))
                    .unwrap_or_else(|payload| {
                        Err(TaskError::WorkerPanicked(panic_message(payload.as_ref())))
                    });
                // The receiver is gone if the monad was cancelled meanwhile.
                let _ = sender.send(result);
            });

        match spawned {
            Ok(_detached) => {
                self.stage = WorkerStage::Waiting { outcome, token };
                Some(Yield::Suspend)
            }
            Err(error) => {
                tracing::warn!(%error, "failed to spawn background worker");
                self.ret.fail(TaskError::external(error));
                None
            }
        }
    }
}

impl<F, T> Block for Worker<F, T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> TaskResult<T> + Send + 'static,
{
    fn step(&mut self, _delta: Duration) -> Option<Yield> {
        match std::mem::replace(&mut self.stage, WorkerStage::Done) {
            WorkerStage::Idle(work) => self.start(work),
            WorkerStage::Waiting { outcome, token } => match outcome.try_recv() {
                Ok(result) => {
                    self.ret.complete(result);
                    None
                }
                Err(TryRecvError::Empty) => {
                    self.stage = WorkerStage::Waiting { outcome, token };
                    Some(Yield::Suspend)
                }
                Err(TryRecvError::Disconnected) => {
                    self.ret.fail(TaskError::WorkerLost);
                    None
                }
            },
            WorkerStage::Done => None,
        }
    }
}

impl<F, T> Drop for Worker<F, T> {
    fn drop(&mut self) {
        if let WorkerStage::Waiting { token, .. } = &self.stage {
            token.cancel();
            tracing::debug!("background worker cancelled; detaching its thread");
        }
    }
}
