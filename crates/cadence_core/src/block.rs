//! # Blocks
//!
//! A block is a resumable sequence of steps. Every step either finishes the
//! block (`None`) or yields exactly one of three things:
//!
//! - [`Yield::Suspend`]: stop for this tick, continue from here next tick
//! - [`Yield::Call`]: run a nested block to completion first (free, no tick)
//! - [`Yield::Op`]: apply an [`Operation`] to the owning task right now
//!
//! ```text
//!   step(delta) ──► None ............ block is exhausted, parent resumes
//!              ├──► Suspend ......... tick ends here
//!              ├──► Call(nested) .... push self, run nested
//!              └──► Op(Become|Spawn)  mutate the owning task, keep going
//! ```
//!
//! Releasing a block is dropping it. Blocks that hold resources release them
//! in `Drop`; the owning task decides the order (see [`crate::task`]).

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// A heap-allocated block, as stored on a task's delegation stack.
pub type BoxBlock = Box<dyn Block>;

/// A resumable step sequence.
pub trait Block {
    /// Advances the block by one step.
    ///
    /// `delta` is the length of the tick being executed. It is the same for
    /// every step taken within one tick.
    fn step(&mut self, delta: Duration) -> Option<Yield>;

    /// Returns true if the next step would finish the block without doing
    /// anything. A task built from an exhausted block starts out finished.
    fn is_exhausted(&self) -> bool {
        false
    }
}

impl<B: Block + ?Sized> Block for Box<B> {
    fn step(&mut self, delta: Duration) -> Option<Yield> {
        (**self).step(delta)
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

/// What a block hands back to its task after a step.
pub enum Yield {
    /// Stop for this tick.
    Suspend,
    /// Run this block to completion before continuing the current one.
    Call(BoxBlock),
    /// Apply an operation to the owning task and keep stepping.
    Op(Operation),
}

impl Yield {
    /// Delegates to a nested block.
    #[must_use]
    pub fn call(block: impl Block + 'static) -> Self {
        Self::Call(Box::new(block))
    }

    /// Replaces the current block with `block` (tail call).
    #[must_use]
    pub fn become_block(block: impl Block + 'static) -> Self {
        Self::Op(Operation::Become(Box::new(block)))
    }

    /// Starts `block` as a sibling task of the current one.
    #[must_use]
    pub fn spawn(block: impl Block + 'static) -> Self {
        Self::Op(Operation::Spawn(Box::new(block)))
    }
}

impl fmt::Debug for Yield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspend => f.write_str("Suspend"),
            Self::Call(_) => f.write_str("Call(..)"),
            Self::Op(op) => write!(f, "Op({op:?})"),
        }
    }
}

/// An immediate command against the task that yielded it.
pub enum Operation {
    /// Drop the current block and continue with this one. The delegation
    /// stack and sibling chain are untouched.
    Become(BoxBlock),
    /// Start a new task from this block in the yielding task's sibling chain.
    Spawn(BoxBlock),
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Become(_) => f.write_str("Become(..)"),
            Self::Spawn(_) => f.write_str("Spawn(..)"),
        }
    }
}

// ============================================================================
// ADAPTERS
// ============================================================================

/// A block driven by a closure. See [`from_fn`].
pub struct FnBlock<F> {
    f: F,
}

impl<F> Block for FnBlock<F>
where
    F: FnMut(Duration) -> Option<Yield>,
{
    fn step(&mut self, delta: Duration) -> Option<Yield> {
        (self.f)(delta)
    }
}

/// Builds a block from a step closure.
///
/// ```rust
/// use cadence_core::{block, Yield};
///
/// let mut left = 3;
/// let countdown = block::from_fn(move |_| {
///     left -= 1;
///     (left > 0).then_some(Yield::Suspend)
/// });
/// # drop(countdown);
/// ```
pub fn from_fn<F>(f: F) -> FnBlock<F>
where
    F: FnMut(Duration) -> Option<Yield>,
{
    FnBlock { f }
}

/// A block with no steps.
#[derive(Clone, Copy, Debug, Default)]
pub struct Empty;

impl Block for Empty {
    fn step(&mut self, _delta: Duration) -> Option<Yield> {
        None
    }

    fn is_exhausted(&self) -> bool {
        true
    }
}

/// Returns a block that finishes on its first step.
#[must_use]
pub const fn empty() -> Empty {
    Empty
}

/// Suspends until the accumulated tick delta covers a duration.
#[derive(Clone, Copy, Debug)]
pub struct Sleep {
    remaining: Duration,
    started: bool,
}

impl Block for Sleep {
    fn step(&mut self, delta: Duration) -> Option<Yield> {
        // The tick that starts the sleep does not count toward it.
        if self.started {
            self.remaining = self.remaining.saturating_sub(delta);
        }
        self.started = true;
        (!self.remaining.is_zero()).then_some(Yield::Suspend)
    }

    fn is_exhausted(&self) -> bool {
        self.remaining.is_zero()
    }
}

/// Returns a block that sleeps for `duration` of tick time.
#[must_use]
pub const fn sleep(duration: Duration) -> Sleep {
    Sleep {
        remaining: duration,
        started: false,
    }
}

/// Runs blocks one after another, each as a nested call.
pub struct Sequence {
    pending: VecDeque<BoxBlock>,
}

impl Block for Sequence {
    fn step(&mut self, _delta: Duration) -> Option<Yield> {
        self.pending.pop_front().map(Yield::Call)
    }

    fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Returns a block that runs every block of `blocks` in order.
pub fn sequence<I>(blocks: I) -> Sequence
where
    I: IntoIterator<Item = BoxBlock>,
{
    Sequence {
        pending: blocks.into_iter().collect(),
    }
}

/// A list of cleanup actions run in reverse order of registration on drop.
///
/// Capture one inside a block to tie cleanup to the block's release.
#[derive(Default)]
pub struct Defer {
    actions: Vec<Box<dyn FnOnce()>>,
}

impl Defer {
    /// Creates an empty cleanup list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action. Later registrations run first.
    pub fn push(&mut self, action: impl FnOnce() + 'static) {
        self.actions.push(Box::new(action));
    }

    /// Returns the number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if no action is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Drop for Defer {
    fn drop(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}

impl fmt::Debug for Defer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defer")
            .field("pending", &self.actions.len())
            .finish()
    }
}

/// A block with a release hook. See [`BlockExt::on_release`].
pub struct OnRelease<B> {
    inner: B,
    // Declared after `inner`: the block is released before the hook runs.
    _hook: Defer,
}

impl<B: Block> Block for OnRelease<B> {
    fn step(&mut self, delta: Duration) -> Option<Yield> {
        self.inner.step(delta)
    }
}

/// Convenience methods for every block.
pub trait BlockExt: Block + Sized + 'static {
    /// Boxes the block for storage on a delegation stack.
    fn boxed(self) -> BoxBlock {
        Box::new(self)
    }

    /// Runs `hook` when the block is released, whether it finished or was
    /// disposed while suspended.
    fn on_release(self, hook: impl FnOnce() + 'static) -> OnRelease<Self> {
        let mut defer = Defer::new();
        defer.push(hook);
        OnRelease {
            inner: self,
            _hook: defer,
        }
    }
}

impl<B: Block + Sized + 'static> BlockExt for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const TICK: Duration = Duration::from_millis(10);

    #[test]
    fn test_empty_finishes_immediately() {
        assert!(empty().step(TICK).is_none());
    }

    #[test]
    fn test_sleep_counts_ticks_after_first() {
        let mut s = sleep(Duration::from_millis(25));
        // start tick + 3 ticks of 10ms to cover 25ms
        assert!(matches!(s.step(TICK), Some(Yield::Suspend)));
        assert!(matches!(s.step(TICK), Some(Yield::Suspend)));
        assert!(matches!(s.step(TICK), Some(Yield::Suspend)));
        assert!(s.step(TICK).is_none());
    }

    #[test]
    fn test_zero_sleep_is_free() {
        assert!(sleep(Duration::ZERO).step(TICK).is_none());
    }

    #[test]
    fn test_sequence_calls_in_order() {
        let mut seq = sequence(vec![empty().boxed(), sleep(TICK).boxed()]);
        assert!(matches!(seq.step(TICK), Some(Yield::Call(_))));
        assert!(matches!(seq.step(TICK), Some(Yield::Call(_))));
        assert!(seq.step(TICK).is_none());
    }

    #[test]
    fn test_exhausted_hints() {
        assert!(empty().is_exhausted());
        assert!(empty().boxed().is_exhausted());
        assert!(sleep(Duration::ZERO).is_exhausted());
        assert!(!sleep(TICK).is_exhausted());
        assert!(sequence(Vec::new()).is_exhausted());
        assert!(!sequence(vec![empty().boxed()]).is_exhausted());
        assert!(!from_fn(|_| None).is_exhausted());
    }

    #[test]
    fn test_defer_runs_lifo() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let mut defer = Defer::new();
            for i in 0..3 {
                let log = Rc::clone(&log);
                defer.push(move || log.borrow_mut().push(i));
            }
            assert_eq!(defer.len(), 3);
        }
        assert_eq!(*log.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn test_on_release_fires_once_on_drop() {
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        let mut block = empty().on_release(move || *h.borrow_mut() += 1);
        assert!(block.step(TICK).is_none());
        assert_eq!(*hits.borrow(), 0);
        drop(block);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_yield_debug() {
        assert_eq!(format!("{:?}", Yield::Suspend), "Suspend");
        assert_eq!(format!("{:?}", Yield::spawn(empty())), "Op(Spawn(..))");
    }
}
