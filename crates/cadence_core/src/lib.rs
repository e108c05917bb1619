//! # CADENCE Core
//!
//! Single-threaded cooperative scheduling for work spread across ticks.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        FrameLoop / block_on                   │
//! │                     resume(delta) once per tick               │
//! ├───────────────────────────────────────────────────────────────┤
//! │  Executor  ── newest first ──►  Task  Task  Task ...          │
//! │                                  │                            │
//! │                     block ─► stack (Call) ─► siblings (Spawn) │
//! ├───────────────────────────────────────────────────────────────┤
//! │  Monad<T>: then / map / catch / when_all / threaded           │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`Block`]: a resumable step sequence that suspends, calls a nested
//!   block, or applies an [`Operation`] to its task
//! - [`Task`]: one running block plus its delegation stack and siblings
//! - [`Executor`]: resumes its entries once per tick, last added first
//! - [`Monad`]: a computation with a single eventual value or [`TaskError`]
//!
//! Time only moves through the `delta` handed to each `resume` call. Nothing
//! here reads a clock except [`FrameLoop`], which paces ticks in real time.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod error;
pub mod executor;
pub mod frame;
pub mod monad;
pub mod task;

pub use block::{Block, BlockExt, BoxBlock, Defer, Operation, Yield};
pub use error::{TaskError, TaskResult};
pub use executor::{
    block_on, block_on_with_budget, join, join_while, timed_join, Executor, Resumable, Spawner,
};
pub use frame::{FrameConfig, FrameLoop, FrameStats};
pub use monad::{threaded, when_all, when_all2, when_all3, CancelToken, Monad, MonadState, Return};
pub use task::{Task, TaskHandle, TaskId};
