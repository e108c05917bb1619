//! # Executor
//!
//! A flat collection of resumables ticked together.
//!
//! ## Ordering
//!
//! Every `resume` call advances each entry exactly once, **last added
//! first**. Helpers spawned after a driver therefore run before the driver
//! looks at their results within the same tick. Entries that report
//! `finished()` afterwards are removed before the next tick.
//!
//! ## Joining
//!
//! [`join`], [`join_while`] and [`timed_join`] turn any resumable (an
//! executor, a shared executor, a task handle) into a block, so one
//! scheduler can be waited on from inside a task running on another.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::block::{Block, Yield};
use crate::error::{TaskError, TaskResult};
use crate::task::{Task, TaskHandle};

/// Anything that can be advanced one tick at a time.
pub trait Resumable {
    /// Returns true once there is nothing left to run.
    ///
    /// Callers stop invoking [`Resumable::resume`] after this turns true.
    fn finished(&self) -> bool;

    /// Advances by one external tick of length `delta`. Must not block.
    fn resume(&mut self, delta: Duration);

    /// Releases everything still suspended. Afterwards `finished()` is true.
    ///
    /// Resumables that hold nothing releasable keep the default no-op.
    fn dispose(&mut self) {}
}

impl<R: Resumable + ?Sized> Resumable for Box<R> {
    fn finished(&self) -> bool {
        (**self).finished()
    }

    fn resume(&mut self, delta: Duration) {
        (**self).resume(delta);
    }

    fn dispose(&mut self) {
        (**self).dispose();
    }
}

/// Shared resumables, e.g. an executor that blocks keep adding to.
///
/// # Panics
///
/// Resuming a shared resumable from inside its own resumption panics: the
/// inner value is already mutably borrowed.
impl<R: Resumable + ?Sized> Resumable for Rc<RefCell<R>> {
    fn finished(&self) -> bool {
        self.borrow().finished()
    }

    fn resume(&mut self, delta: Duration) {
        self.borrow_mut().resume(delta);
    }

    fn dispose(&mut self) {
        self.borrow_mut().dispose();
    }
}

type Entry = Box<dyn Resumable>;

/// Reverse-of-insertion scheduler over boxed resumables.
///
/// An executor is itself [`Resumable`], so executors nest.
#[derive(Default)]
pub struct Executor {
    /// Live entries, in insertion order.
    entries: Vec<Entry>,
    /// Entries queued through a [`Spawner`], admitted on the next `resume`.
    incoming: Rc<RefCell<Vec<Entry>>>,
}

impl Executor {
    /// Creates an empty executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resumable. It runs from the next `resume` call on.
    pub fn add(&mut self, resumable: impl Resumable + 'static) {
        self.entries.push(Box::new(resumable));
    }

    /// Wraps `block` in a task, adds it, and returns a handle to observe it.
    pub fn spawn(&mut self, block: impl Block + 'static) -> TaskHandle {
        let handle = TaskHandle::new(Task::new(block));
        self.add(handle.clone());
        handle
    }

    /// Returns a handle that queues new entries from anywhere, including
    /// blocks currently running on this executor.
    #[must_use]
    pub fn spawner(&self) -> Spawner {
        Spawner {
            queue: Rc::clone(&self.incoming),
        }
    }

    /// Number of live entries, including ones queued by a spawner.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() + self.incoming.borrow().len()
    }

    /// Returns true if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry without calling `dispose` on it.
    ///
    /// Tasks still release their blocks when the last reference goes away;
    /// entries that are shared elsewhere (a [`TaskHandle`] kept by a caller)
    /// stay alive and suspended. Dispose them first if they must be torn
    /// down.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.incoming.borrow_mut().clear();
    }

    /// Moves spawner-queued entries into the live list.
    fn admit(&mut self) {
        let mut incoming = self.incoming.borrow_mut();
        if !incoming.is_empty() {
            tracing::trace!(count = incoming.len(), "admitting queued entries");
            self.entries.append(&mut incoming);
        }
    }
}

impl Resumable for Executor {
    fn finished(&self) -> bool {
        self.is_empty()
    }

    fn resume(&mut self, delta: Duration) {
        self.admit();

        for entry in self.entries.iter_mut().rev() {
            // A peer may have disposed this entry earlier in the same tick.
            if !entry.finished() {
                entry.resume(delta);
            }
        }

        self.entries.retain(|entry| !entry.finished());
    }

    fn dispose(&mut self) {
        self.admit();
        if !self.entries.is_empty() {
            tracing::debug!(count = self.entries.len(), "disposing executor entries");
        }
        for entry in self.entries.iter_mut().rev() {
            entry.dispose();
        }
        self.entries.clear();
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("entries", &self.entries.len())
            .field("incoming", &self.incoming.borrow().len())
            .finish()
    }
}

/// Queues entries for an [`Executor`] without borrowing it.
#[derive(Clone)]
pub struct Spawner {
    queue: Rc<RefCell<Vec<Entry>>>,
}

impl Spawner {
    /// Queues a resumable. It joins the executor on its next `resume`.
    pub fn add(&self, resumable: impl Resumable + 'static) {
        self.queue.borrow_mut().push(Box::new(resumable));
    }

    /// Queues `block` as a new task and returns a handle to observe it.
    pub fn spawn(&self, block: impl Block + 'static) -> TaskHandle {
        let handle = TaskHandle::new(Task::new(block));
        self.add(handle.clone());
        handle
    }
}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner")
            .field("queued", &self.queue.borrow().len())
            .finish()
    }
}

// ============================================================================
// JOIN BLOCKS
// ============================================================================

/// Resumes a target every tick until it finishes. See [`join`].
pub struct Join<R> {
    target: R,
}

impl<R: Resumable> Block for Join<R> {
    fn step(&mut self, delta: Duration) -> Option<Yield> {
        if !self.target.finished() {
            self.target.resume(delta);
        }
        (!self.target.finished()).then_some(Yield::Suspend)
    }
}

/// Waits for `target` to finish, resuming it once per tick starting with
/// the current one.
pub fn join<R: Resumable>(target: R) -> Join<R> {
    Join { target }
}

/// Resumes a target while a predicate holds. See [`join_while`].
pub struct JoinWhile<R, P> {
    target: R,
    predicate: P,
    started: bool,
}

impl<R, P> Block for JoinWhile<R, P>
where
    R: Resumable,
    P: FnMut() -> bool,
{
    fn step(&mut self, delta: Duration) -> Option<Yield> {
        if self.started && !self.target.finished() {
            self.target.resume(delta);
        }
        self.started = true;
        (self.predicate)().then_some(Yield::Suspend)
    }
}

/// Keeps resuming `target` on following ticks for as long as `predicate`
/// returns true. The predicate is checked before the first suspension.
pub fn join_while<R, P>(target: R, predicate: P) -> JoinWhile<R, P>
where
    R: Resumable,
    P: FnMut() -> bool,
{
    JoinWhile {
        target,
        predicate,
        started: false,
    }
}

/// Resumes a target until it finishes or a tick-time budget runs out.
/// See [`timed_join`].
pub struct TimedJoin<R> {
    target: R,
    remaining: Duration,
    started: bool,
}

impl<R: Resumable> Block for TimedJoin<R> {
    fn step(&mut self, delta: Duration) -> Option<Yield> {
        if self.started {
            self.remaining = self.remaining.saturating_sub(delta);
            if !self.target.finished() {
                self.target.resume(delta);
            }
        }
        self.started = true;

        if self.remaining.is_zero() || self.target.finished() {
            if !self.target.finished() {
                tracing::debug!("timed join budget spent with work still pending");
            }
            return None;
        }
        Some(Yield::Suspend)
    }
}

/// Waits on `target` for at most `budget` of tick time.
///
/// Running out of budget cancels nothing: the target keeps whatever state
/// it reached and can be joined again or disposed by the caller.
pub fn timed_join<R: Resumable>(target: R, budget: Duration) -> TimedJoin<R> {
    TimedJoin {
        target,
        remaining: budget,
        started: false,
    }
}

impl Executor {
    /// Consumes the executor into a block that waits for all its entries.
    #[must_use]
    pub fn into_join(self) -> Join<Self> {
        join(self)
    }
}

// ============================================================================
// BLOCKING DRIVERS
// ============================================================================

/// Resumes `target` with a fixed `delta` until it finishes.
///
/// Returns the number of ticks taken. Does not return if the target never
/// finishes; see [`block_on_with_budget`].
pub fn block_on<R: Resumable + ?Sized>(target: &mut R, delta: Duration) -> u64 {
    let mut ticks = 0;
    while !target.finished() {
        target.resume(delta);
        ticks += 1;
    }
    ticks
}

/// Like [`block_on`], but gives up after `max_ticks`.
///
/// # Errors
///
/// Returns [`TaskError::TickBudgetExhausted`] if the target is still running
/// after `max_ticks` ticks. The target is left as it was.
pub fn block_on_with_budget<R: Resumable + ?Sized>(
    target: &mut R,
    delta: Duration,
    max_ticks: u64,
) -> TaskResult<u64> {
    let mut ticks = 0;
    while !target.finished() {
        if ticks == max_ticks {
            return Err(TaskError::TickBudgetExhausted(max_ticks));
        }
        target.resume(delta);
        ticks += 1;
    }
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{self, BlockExt};

    const TICK: Duration = Duration::from_millis(16);

    /// A block that records its name every step and suspends `steps` times.
    fn recorder(name: &'static str, steps: usize, log: &Rc<RefCell<Vec<&'static str>>>) -> impl Block {
        let log = Rc::clone(log);
        let mut left = steps;
        block::from_fn(move |_| {
            log.borrow_mut().push(name);
            if left == 0 {
                return None;
            }
            left -= 1;
            Some(Yield::Suspend)
        })
    }

    #[test]
    fn test_reverse_insertion_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut executor = Executor::new();
        executor.spawn(recorder("a", 1, &log));
        executor.spawn(recorder("b", 1, &log));
        executor.spawn(recorder("c", 1, &log));

        executor.resume(TICK);
        assert_eq!(*log.borrow(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_finished_entries_pruned() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut executor = Executor::new();
        executor.spawn(recorder("short", 0, &log));
        executor.spawn(recorder("long", 2, &log));
        assert_eq!(executor.len(), 2);

        executor.resume(TICK);
        assert_eq!(executor.len(), 1);
        executor.resume(TICK);
        executor.resume(TICK);
        assert!(executor.finished());
    }

    #[test]
    fn test_spawner_admits_on_next_resume() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut executor = Executor::new();
        let spawner = executor.spawner();

        let inner_log = Rc::clone(&log);
        let late_spawner = spawner.clone();
        executor.spawn(block::from_fn(move |_| {
            inner_log.borrow_mut().push("driver");
            late_spawner.spawn(recorder("late", 0, &inner_log));
            None
        }));

        executor.resume(TICK);
        assert_eq!(*log.borrow(), vec!["driver"]);
        assert_eq!(executor.len(), 1);

        executor.resume(TICK);
        assert_eq!(*log.borrow(), vec!["driver", "late"]);
        assert!(executor.is_empty());
    }

    #[test]
    fn test_dispose_releases_entries() {
        let released = Rc::new(RefCell::new(0));
        let mut executor = Executor::new();
        for _ in 0..3 {
            let r = Rc::clone(&released);
            executor.spawn(block::sleep(Duration::from_secs(60)).on_release(move || *r.borrow_mut() += 1));
        }
        executor.resume(TICK);
        executor.dispose();
        assert_eq!(*released.borrow(), 3);
        assert!(executor.finished());
    }

    #[test]
    fn test_clear_keeps_shared_handles_alive() {
        let mut executor = Executor::new();
        let handle = executor.spawn(block::sleep(Duration::from_secs(1)));
        executor.resume(TICK);
        executor.clear();
        assert!(executor.is_empty());
        assert!(!handle.finished());
    }

    #[test]
    fn test_join_resumes_in_first_tick() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut inner = Executor::new();
        inner.spawn(recorder("inner", 1, &log));

        let mut outer = Executor::new();
        outer.spawn(inner.into_join());

        outer.resume(TICK);
        assert_eq!(*log.borrow(), vec!["inner"]);
        assert!(!outer.finished());
        outer.resume(TICK);
        assert!(outer.finished());
    }

    #[test]
    fn test_join_while_stops_on_predicate() {
        let inner = Rc::new(RefCell::new(Executor::new()));
        inner.borrow_mut().spawn(block::sleep(Duration::from_secs(60)));

        let calls = Rc::new(RefCell::new(0));
        let c = Rc::clone(&calls);
        let mut outer = Executor::new();
        outer.spawn(join_while(Rc::clone(&inner), move || {
            *c.borrow_mut() += 1;
            *c.borrow() < 3
        }));

        let ticks = block_on(&mut outer, TICK);
        assert_eq!(ticks, 3);
        assert!(!inner.borrow().finished());
    }

    #[test]
    fn test_timed_join_gives_up_without_cancelling() {
        let inner = Rc::new(RefCell::new(Executor::new()));
        let work = inner.borrow_mut().spawn(block::sleep(Duration::from_secs(60)));

        let mut outer = Executor::new();
        outer.spawn(timed_join(Rc::clone(&inner), Duration::from_millis(40)));

        let ticks = block_on(&mut outer, Duration::from_millis(10));
        assert_eq!(ticks, 5);
        assert!(!work.finished());
        assert_eq!(inner.borrow().len(), 1);
    }

    #[test]
    fn test_block_on_budget() {
        let mut executor = Executor::new();
        executor.spawn(block::sleep(Duration::from_secs(60)));
        let err = block_on_with_budget(&mut executor, TICK, 10).unwrap_err();
        assert!(matches!(err, TaskError::TickBudgetExhausted(10)));

        let mut quick = Executor::new();
        quick.spawn(block::sleep(TICK));
        assert_eq!(block_on_with_budget(&mut quick, TICK, 10).unwrap(), 2);
    }

    #[test]
    fn test_nested_executor_is_resumable() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut inner = Executor::new();
        inner.spawn(recorder("nested", 0, &log));

        let mut outer = Executor::new();
        outer.add(inner);
        outer.resume(TICK);
        assert_eq!(*log.borrow(), vec!["nested"]);
        assert!(outer.finished());
    }
}
