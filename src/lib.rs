//! # kasync - Composable Asynchronous Job Chains
//!
//! Build, store and later execute chains of asynchronous steps with uniform
//! ordering, error propagation, lifetime and cancellation semantics.
//!
//! The central abstraction is the typed [`Job`]: a value-like handle over a
//! lazily assembled pipeline. Combinators such as [`Job::then`] only describe
//! work; nothing runs until [`Job::exec`] instantiates an execution chain and
//! returns the tail [`Future`]. Jobs can be executed repeatedly, shared, and
//! branched from a common prefix.
//!
//! ## Core Concepts
//!
//! - **[`Job<Out, In>`](Job)** - the public handle. `then` and friends append
//!   steps; `exec` starts one run and hands back a future.
//! - **[`Future<T>`](Future)** - a shared completion cell: pending until
//!   finished exactly once, carrying an optional value and a list of
//!   [`Error`]s. Holding a future never blocks a pipeline, dropping it never
//!   aborts one.
//! - **[`FutureWatcher<T>`](FutureWatcher)** - a one-shot ready/progress
//!   subscriber that is disarmed by dropping it.
//! - **Continuations** - each step body is one of six shapes: synchronous,
//!   callback-driven, or nested-job-producing, each optionally observing the
//!   upstream error. Plain steps are skipped while an error is live;
//!   error-aware steps always run and may recover.
//!
//! ## Quick Start
//!
//! ```rust
//! use kasync::{start, Future};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let job = start(|future: Future<Vec<i32>>| {
//!         // Complete from any callback-driven source; here, immediately.
//!         future.set_result(vec![1, 2, 3, 4]);
//!     })
//!     .each(|id| kasync::value(id + 1))
//!     .then(|ids: Vec<i32>| ids.into_iter().sum::<i32>());
//!
//!     let result = job.exec();
//!     result.wait_for_finished().await;
//!     assert_eq!(result.value(), Some(14));
//! }
//! ```
//!
//! ## Execution Model
//!
//! ```text
//!  Job::exec()
//!      │ walks predecessors to the head, one Execution per Executor
//!      ▼
//!  ┌──────────┐ finished ┌──────────┐ finished ┌──────────┐
//!  │ head     │─────────▶│ step 2   │─────────▶│ tail     │──▶ tail Future
//!  │ Executor │  future  │ Executor │  future  │ Executor │
//!  └──────────┘          └──────────┘          └──────────┘
//! ```
//!
//! Each step waits on its predecessor's future through a one-shot ready
//! subscription and fills its own. The engine is single-threaded cooperative:
//! completions run their subscribers synchronously in the finishing turn, and
//! suspension is delegated to the ambient tokio runtime (timers, external
//! completion sources).
//!
//! A running pipeline keeps itself alive. Each execution owns its executor
//! and its predecessor execution, and the engine's own ready subscription on
//! a step's future anchors the chain until the run completes, so
//! fire-and-forget is safe.
//!
//! ## Errors and Recovery
//!
//! A failing step finishes its future with an [`Error`] (integer code plus
//! message). Downstream plain steps are skipped and forward the first error
//! to the tail; `*_with_error` steps always run, receive the error (or the
//! zero error on success), and recover the chain when they finish without a
//! new error. [`Job::on_error`] observes without consuming.
//!
//! ## Cancellation
//!
//! There is no abort on a future. Attach a [`Job::guard`] to an `Arc`
//! sentinel instead: once the sentinel is dropped, every not-yet-run step of
//! a running pipeline short-circuits and finishes with no value and no
//! error.
//!
//! ## Module Organization
//!
//! - [`job`] - the [`Job`] handle, combinators, and the `start` / `value` /
//!   `null` / `error` constructors
//! - [`future`] - [`Future`] completion cells
//! - [`watcher`] - [`FutureWatcher`] subscriptions
//! - [`combinator`] - [`wait`], [`do_while`], [`for_each`],
//!   [`serial_for_each`], [`wait_for_completion`]
//! - [`mod@error`] - the [`Error`] value
//!
//! Execution tracing is emitted under the `kasync::trace` target at trace
//! level: one indented `START` / `END` line pair per step execution.

pub mod combinator;
pub mod error;
pub mod future;
pub mod job;
pub mod watcher;

mod continuation;
mod execution;
mod executor;
mod trace;

pub use combinator::{
    do_while, for_each, serial_for_each, wait, wait_for_completion, ControlFlow,
};
pub use error::Error;
pub use future::Future;
pub use job::{error, null, start, start_with, value, Job, JobValue};
pub use watcher::FutureWatcher;
