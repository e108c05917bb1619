//! # Tasks
//!
//! A task owns one running block, the stack of blocks suspended beneath it,
//! and a chain of sibling tasks it spawned.
//!
//! ```text
//!   Task
//!   ├── block ........ the block being stepped
//!   ├── stack ........ parents waiting on `block` (LIFO)
//!   └── siblings ..... Executor of spawned tasks, ticked after `block`
//! ```
//!
//! ## Resumption (one tick)
//!
//! 1. Step `block` until it suspends. Nested calls push, exhausted blocks pop;
//!    neither consumes the tick. Operations apply in place.
//! 2. Resume every sibling once, newest first. Finished siblings are pruned.
//!
//! ## Disposal
//!
//! Drops the current block, then the stack top to bottom, then disposes the
//! siblings. Dropping a task disposes it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::block::{Block, BoxBlock, Operation, Yield};
use crate::executor::{Executor, Resumable};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a task in log output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// A steppable unit of work.
pub struct Task {
    id: TaskId,
    /// The block being stepped. `None` once the task body is done.
    block: Option<BoxBlock>,
    /// Parents suspended on a nested call, innermost last.
    stack: Vec<BoxBlock>,
    /// Tasks spawned by this one.
    siblings: Executor,
}

impl Task {
    /// Creates a task that will run `block`.
    pub fn new(block: impl Block + 'static) -> Self {
        Self::from_boxed(Box::new(block))
    }

    /// Creates a task from an already boxed block.
    ///
    /// An exhausted block is dropped on the spot, so the task is finished
    /// before its first resume.
    #[must_use]
    pub fn from_boxed(block: BoxBlock) -> Self {
        let id = TaskId::next();
        tracing::trace!(%id, "task created");
        Self {
            id,
            block: (!block.is_exhausted()).then_some(block),
            stack: Vec::new(),
            siblings: Executor::new(),
        }
    }

    /// Returns this task's id.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Number of blocks suspended beneath the current one.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of live sibling tasks.
    #[must_use]
    pub fn sibling_count(&self) -> usize {
        self.siblings.len()
    }

    /// Steps the current block until it suspends or the stack unwinds fully.
    fn run_block(&mut self, delta: Duration) {
        while let Some(block) = self.block.as_mut() {
            match block.step(delta) {
                None => {
                    // Exhausted: release it and fall back to the parent.
                    let done = std::mem::replace(&mut self.block, self.stack.pop());
                    drop(done);
                }
                Some(Yield::Suspend) => break,
                Some(Yield::Call(nested)) => {
                    if let Some(parent) = self.block.replace(nested) {
                        self.stack.push(parent);
                    }
                }
                Some(Yield::Op(op)) => self.apply(op),
            }
        }
    }

    fn apply(&mut self, op: Operation) {
        match op {
            Operation::Become(next) => {
                drop(self.block.replace(next));
            }
            Operation::Spawn(block) => {
                let sibling = Self::from_boxed(block);
                tracing::trace!(parent = %self.id, id = %sibling.id, "sibling spawned");
                self.siblings.add(sibling);
            }
        }
    }

    fn release(&mut self) {
        if self.block.is_none() && self.stack.is_empty() && self.siblings.is_empty() {
            return;
        }
        tracing::trace!(id = %self.id, depth = self.stack.len(), "task disposed");
        drop(self.block.take());
        while let Some(parent) = self.stack.pop() {
            drop(parent);
        }
        self.siblings.dispose();
    }
}

impl Resumable for Task {
    fn finished(&self) -> bool {
        self.block.is_none() && self.siblings.is_empty()
    }

    fn resume(&mut self, delta: Duration) {
        if self.block.is_some() {
            self.run_block(delta);
        }
        self.siblings.resume(delta);
    }

    fn dispose(&mut self) {
        self.release();
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("running", &self.block.is_some())
            .field("depth", &self.stack.len())
            .field("siblings", &self.siblings.len())
            .finish()
    }
}

/// A shared reference to a task that an executor also holds.
///
/// Lets the code that spawned a task watch it finish or cancel it.
#[derive(Clone)]
pub struct TaskHandle {
    task: Rc<RefCell<Task>>,
}

impl TaskHandle {
    /// Shares `task`.
    #[must_use]
    pub fn new(task: Task) -> Self {
        Self {
            task: Rc::new(RefCell::new(task)),
        }
    }

    /// Returns the task id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.task.borrow().id()
    }

    fn task_mut(&self) -> std::cell::RefMut<'_, Task> {
        match self.task.try_borrow_mut() {
            Ok(task) => task,
            Err(_) => panic!("task resumed or disposed from inside its own resumption"),
        }
    }
}

impl Resumable for TaskHandle {
    fn finished(&self) -> bool {
        self.task.borrow().finished()
    }

    fn resume(&mut self, delta: Duration) {
        self.task_mut().resume(delta);
    }

    fn dispose(&mut self) {
        self.task_mut().dispose();
    }
}

impl TaskHandle {
    /// Returns true once the task and all its siblings are done.
    #[must_use]
    pub fn finished(&self) -> bool {
        Resumable::finished(self)
    }

    /// Disposes the task through a shared reference.
    ///
    /// # Panics
    ///
    /// Panics if called from inside the task's own resumption.
    pub fn cancel(&self) {
        self.task_mut().dispose();
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.task.try_borrow() {
            Ok(task) => task.fmt(f),
            Err(_) => f.write_str("TaskHandle(<running>)"),
        }
    }
}
