//! Concurrent joins: `when_all`, `when_all2`, `when_all3`.
//!
//! Components run as tasks on a private executor owned by the combinator's
//! block. They are resumed in argument order, once per tick. The first
//! component to fail decides the outcome, and every peer still in flight is
//! disposed before the combinator completes.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::{Monad, Return};
use crate::block::{Block, BoxBlock, Yield};
use crate::error::{TaskError, TaskResult};
use crate::executor::{Executor, Resumable};
use crate::task::Task;

type FailureSlot = Rc<RefCell<Option<TaskError>>>;

/// Components of one join and the executor they run on.
struct Group {
    executor: Executor,
    failure: FailureSlot,
    staged: Vec<BoxBlock>,
    started: bool,
}

impl Group {
    fn new() -> Self {
        Self {
            executor: Executor::new(),
            failure: Rc::new(RefCell::new(None)),
            staged: Vec::new(),
            started: false,
        }
    }

    fn watch<T: 'static>(&mut self, monad: &Monad<T>) {
        self.staged.push(Box::new(Watch {
            monad: monad.clone(),
            failure: Rc::clone(&self.failure),
            started: false,
        }));
    }

    /// Advances every component once.
    ///
    /// Returns `None` while components are still running.
    fn poll(&mut self, delta: Duration) -> Option<TaskResult<()>> {
        if !self.started {
            self.started = true;
            // The executor runs newest first; insert backwards so the first
            // argument goes first.
            for part in self.staged.drain(..).rev() {
                self.executor.add(Task::from_boxed(part));
            }
        }

        self.executor.resume(delta);

        let failure = self.failure.borrow_mut().take();
        if let Some(error) = failure {
            tracing::debug!(%error, in_flight = self.executor.len(), "join component failed");
            self.executor.dispose();
            return Some(Err(error));
        }
        self.executor.finished().then_some(Ok(()))
    }
}

/// Runs one component and records its failure, if it is the first.
struct Watch<T> {
    monad: Monad<T>,
    failure: FailureSlot,
    started: bool,
}

impl<T: 'static> Block for Watch<T> {
    fn step(&mut self, _delta: Duration) -> Option<Yield> {
        if !self.started {
            self.started = true;
            return Some(Yield::Call(self.monad.run()));
        }
        if let Some(error) = self.monad.error() {
            let mut failure = self.failure.borrow_mut();
            if failure.is_none() {
                *failure = Some(error);
            }
        }
        None
    }
}

/// Drives a group and assembles its result once every component succeeded.
struct Joined<R, C> {
    group: Group,
    collect: Option<C>,
    ret: Return<R>,
}

impl<R, C> Block for Joined<R, C>
where
    C: FnOnce() -> TaskResult<R>,
{
    fn step(&mut self, delta: Duration) -> Option<Yield> {
        let Some(outcome) = self.group.poll(delta) else {
            return Some(Yield::Suspend);
        };
        let collected = outcome.and_then(|()| match self.collect.take() {
            Some(collect) => collect(),
            None => Err(TaskError::NoOutcome),
        });
        self.ret.complete(collected);
        None
    }
}

impl<R, C> Joined<R, C> {
    fn new(group: Group, collect: C, ret: Return<R>) -> Self {
        Self {
            group,
            collect: Some(collect),
            ret,
        }
    }
}

/// Runs every monad concurrently and collects their values in argument
/// order.
///
/// The first failure wins: its error becomes the combinator's error and all
/// other components still running are disposed. An empty input succeeds
/// with an empty vector on the first tick. The same monad may appear more
/// than once; it runs once and every position receives its value.
pub fn when_all<T, I>(monads: I) -> Monad<Vec<T>>
where
    T: Clone + 'static,
    I: IntoIterator<Item = Monad<T>>,
{
    let monads: Vec<Monad<T>> = monads.into_iter().collect();
    Monad::new(move |ret| {
        let mut group = Group::new();
        for monad in &monads {
            group.watch(monad);
        }
        Joined::new(
            group,
            move || monads.iter().map(Monad::settled).collect::<TaskResult<Vec<T>>>(),
            ret,
        )
    })
}

/// Runs two monads concurrently. See [`when_all`].
pub fn when_all2<A, B>(a: &Monad<A>, b: &Monad<B>) -> Monad<(A, B)>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    let (a, b) = (a.clone(), b.clone());
    Monad::new(move |ret| {
        let mut group = Group::new();
        group.watch(&a);
        group.watch(&b);
        Joined::new(
            group,
            move || -> TaskResult<(A, B)> { Ok((a.settled()?, b.settled()?)) },
            ret,
        )
    })
}

/// Runs three monads concurrently. See [`when_all`].
pub fn when_all3<A, B, C>(a: &Monad<A>, b: &Monad<B>, c: &Monad<C>) -> Monad<(A, B, C)>
where
    A: Clone + 'static,
    B: Clone + 'static,
    C: Clone + 'static,
{
    let (a, b, c) = (a.clone(), b.clone(), c.clone());
    Monad::new(move |ret| {
        let mut group = Group::new();
        group.watch(&a);
        group.watch(&b);
        group.watch(&c);
        Joined::new(
            group,
            move || -> TaskResult<(A, B, C)> { Ok((a.settled()?, b.settled()?, c.settled()?)) },
            ret,
        )
    })
}
