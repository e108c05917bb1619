//! Sequential combinators: `then`, `try_then`, `then_select`, `map`, `catch`.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use super::{Monad, Return};
use crate::block::{Block, Yield};
use crate::error::{TaskError, TaskResult};

impl<T: Clone + 'static> Monad<T> {
    /// Runs `self`, then the monad `binder` builds from its value.
    ///
    /// If `self` fails, `binder` is never called and the error passes
    /// through. A panic inside `binder` becomes [`TaskError::Panicked`].
    /// `self` keeps its outcome: other handles still read it afterwards, and
    /// the same monad can feed any number of combinators.
    pub fn then<U, F>(&self, binder: F) -> Monad<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Monad<U> + 'static,
    {
        self.try_then(move |value| Ok(binder(value)))
    }

    /// Like [`Monad::then`], for binders that can refuse to continue.
    pub fn try_then<U, F>(&self, binder: F) -> Monad<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> TaskResult<Monad<U>> + 'static,
    {
        let first = self.clone();
        Monad::new(move |ret| Bind {
            stage: BindStage::Start { first, binder },
            ret,
        })
    }

    /// Binds, then combines both values with `selector`.
    pub fn then_select<U, V, F, S>(&self, binder: F, selector: S) -> Monad<V>
    where
        U: Clone + 'static,
        V: Clone + 'static,
        F: FnOnce(&T) -> Monad<U> + 'static,
        S: FnOnce(T, U) -> V + 'static,
    {
        self.then(move |first| {
            let second = binder(&first);
            second.map(move |second| selector(first, second))
        })
    }

    /// Transforms the value without further suspension.
    pub fn map<U, F>(&self, mapper: F) -> Monad<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.then(move |value| Monad::ok(mapper(value)))
    }

    /// Runs `self`; on failure, adopts the outcome of the monad `handler`
    /// builds from the error. Success passes through untouched.
    pub fn catch<F>(&self, handler: F) -> Monad<T>
    where
        F: FnOnce(TaskError) -> Monad<T> + 'static,
    {
        let first = self.clone();
        Monad::new(move |ret| Catch {
            stage: CatchStage::Start { first, handler },
            ret,
        })
    }
}

enum BindStage<T, U, F> {
    Start { first: Monad<T>, binder: F },
    AwaitFirst { first: Monad<T>, binder: F },
    AwaitSecond(Monad<U>),
    Done,
}

struct Bind<T, U, F> {
    stage: BindStage<T, U, F>,
    ret: Return<U>,
}

impl<T, U, F> Block for Bind<T, U, F>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: FnOnce(T) -> TaskResult<Monad<U>>,
{
    fn step(&mut self, _delta: Duration) -> Option<Yield> {
        match std::mem::replace(&mut self.stage, BindStage::Done) {
            BindStage::Start { first, binder } => {
                let body = first.run();
                self.stage = BindStage::AwaitFirst { first, binder };
                Some(Yield::Call(body))
            }
            BindStage::AwaitFirst { first, binder } => {
                let value = match first.settled() {
                    Ok(value) => value,
                    Err(error) => {
                        self.ret.fail(error);
                        return None;
                    }
                };
                match panic::catch_unwind(AssertUnwindSafe(move || binder(value))) {
                    Ok(Ok(second)) => {
                        let body = second.run();
                        self.stage = BindStage::AwaitSecond(second);
                        Some(Yield::Call(body))
                    }
                    Ok(Err(error)) => {
                        self.ret.fail(error);
                        None
                    }
                    Err(payload) => {
                        self.ret.fail(TaskError::from_panic(payload.as_ref()));
                        None
                    }
                }
            }
            BindStage::AwaitSecond(second) => {
                self.ret.complete(second.settled());
                None
            }
            BindStage::Done => None,
        }
    }
}

enum CatchStage<T, H> {
    Start { first: Monad<T>, handler: H },
    AwaitFirst { first: Monad<T>, handler: H },
    AwaitSecond(Monad<T>),
    Done,
}

struct Catch<T, H> {
    stage: CatchStage<T, H>,
    ret: Return<T>,
}

impl<T, H> Block for Catch<T, H>
where
    T: Clone + 'static,
    H: FnOnce(TaskError) -> Monad<T>,
{
    fn step(&mut self, _delta: Duration) -> Option<Yield> {
        match std::mem::replace(&mut self.stage, CatchStage::Done) {
            CatchStage::Start { first, handler } => {
                let body = first.run();
                self.stage = CatchStage::AwaitFirst { first, handler };
                Some(Yield::Call(body))
            }
            CatchStage::AwaitFirst { first, handler } => {
                let error = match first.settled() {
                    Ok(value) => {
                        self.ret.accept(value);
                        return None;
                    }
                    Err(error) => error,
                };
                tracing::debug!(%error, "recovering from failure");
                match panic::catch_unwind(AssertUnwindSafe(move || handler(error))) {
                    Ok(second) => {
                        let body = second.run();
                        self.stage = CatchStage::AwaitSecond(second);
                        Some(Yield::Call(body))
                    }
                    Err(payload) => {
                        self.ret.fail(TaskError::from_panic(payload.as_ref()));
                        None
                    }
                }
            }
            CatchStage::AwaitSecond(second) => {
                self.ret.complete(second.settled());
                None
            }
            CatchStage::Done => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::block;
    use crate::executor::{block_on, Executor, Resumable};
    use crate::monad::MonadState;

    const TICK: Duration = Duration::from_millis(16);

    fn after<T: 'static>(ticks: usize, outcome: TaskResult<T>) -> Monad<T> {
        Monad::new(move |ret: Return<T>| {
            let mut left = ticks;
            let mut outcome = Some(outcome);
            block::from_fn(move |_| {
                if left > 0 {
                    left -= 1;
                    return Some(Yield::Suspend);
                }
                if let Some(outcome) = outcome.take() {
                    ret.complete(outcome);
                }
                None
            })
        })
    }

    fn drive<T: 'static>(m: &Monad<T>) -> u64 {
        let mut executor = Executor::new();
        executor.spawn(m.run());
        block_on(&mut executor, TICK)
    }

    #[test]
    fn test_then_map_ticks_add_up() {
        let m = after(2, Ok(42))
            .then(|x| after(3, Ok(x * 2)))
            .map(|y: i32| y.to_string());
        // The second monad starts on the tick the first one settles.
        assert_eq!(drive(&m), 6);
        assert_eq!(m.result().as_deref(), Some("84"));
    }

    #[test]
    fn test_then_skips_binder_on_failure() {
        let called = Rc::new(Cell::new(false));
        let c = Rc::clone(&called);
        let m = after::<i32>(1, Err(TaskError::msg("first failed"))).then(move |x| {
            c.set(true);
            Monad::ok(x)
        });
        drive(&m);
        assert!(!called.get());
        assert_eq!(m.error().map(|e| e.to_string()).as_deref(), Some("first failed"));
    }

    #[test]
    fn test_then_captures_binder_panic() {
        let m = Monad::ok(1).then(|_| -> Monad<i32> { panic!("binder exploded") });
        drive(&m);
        match m.error() {
            Some(TaskError::Panicked(msg)) => assert_eq!(msg, "binder exploded"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_try_then_error() {
        let m = Monad::ok(5).try_then(|x| -> TaskResult<Monad<i32>> {
            if x > 3 {
                Err(TaskError::msg("too big"))
            } else {
                Ok(Monad::ok(x))
            }
        });
        drive(&m);
        assert_eq!(m.error().map(|e| e.to_string()).as_deref(), Some("too big"));
    }

    #[test]
    fn test_then_select_keeps_both_values() {
        let m = Monad::ok(3).then_select(|x| after(1, Ok(*x + 1)), |a, b| a * b);
        drive(&m);
        assert_eq!(m.result(), Some(12));
    }

    #[test]
    fn test_catch_recovers_once() {
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let m = after::<&str>(1, Err(TaskError::msg("lost"))).catch(move |e| {
            c.set(c.get() + 1);
            assert_eq!(e.to_string(), "lost");
            after(2, Ok("recovered"))
        });
        drive(&m);
        assert_eq!(calls.get(), 1);
        assert_eq!(m.result(), Some("recovered"));
    }

    #[test]
    fn test_catch_passes_success_through() {
        let m = after(1, Ok(9)).catch(|_| Monad::ok(0));
        drive(&m);
        assert_eq!(m.result(), Some(9));
    }

    #[test]
    fn test_catch_adopts_handler_failure() {
        let m = Monad::<u8>::err("a").catch(|_| Monad::err("b"));
        drive(&m);
        assert_eq!(m.error().map(|e| e.to_string()).as_deref(), Some("b"));
    }

    #[test]
    fn test_upstream_keeps_value_after_map() {
        let first = after(1, Ok(String::from("shared")));
        let lengths = first.map(|s| s.len());
        drive(&lengths);
        assert_eq!(lengths.result(), Some(6));
        assert_eq!(first.result().as_deref(), Some("shared"));
        assert_eq!(first.outcome().map(Result::ok), Some(Some(String::from("shared"))));
    }

    #[test]
    fn test_completed_monad_binds_twice() {
        let first = after(1, Ok(10));
        let doubled = first.map(|x| x * 2);
        drive(&doubled);

        let tripled = first.then(|x| after(1, Ok(x * 3)));
        drive(&tripled);
        assert_eq!(doubled.result(), Some(20));
        assert_eq!(tripled.result(), Some(30));
        assert_eq!(first.result(), Some(10));
    }

    #[test]
    fn test_then_over_running_monad_waits() {
        let shared = after(3, Ok(4));
        let plain = shared.map(|x| x + 1);
        let doubled = shared.map(|x| x * 2);

        let mut executor = Executor::new();
        executor.spawn(plain.run());
        executor.spawn(doubled.run());
        block_on(&mut executor, TICK);
        assert_eq!(plain.result(), Some(5));
        assert_eq!(doubled.result(), Some(8));
    }

    #[test]
    fn test_nothing_observable_before_completion() {
        let m = after(2, Ok(1)).then(|x| after(2, Ok(x + 1)));
        let mut executor = Executor::new();
        executor.spawn(m.run());
        for _ in 0..4 {
            executor.resume(TICK);
            assert_eq!(m.state(), MonadState::Running);
            assert!(m.result().is_none() && m.error().is_none());
        }
        executor.resume(TICK);
        assert_eq!(m.result(), Some(2));
    }
}
