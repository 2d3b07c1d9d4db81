//! The public job handle and its combinators.
//!
//! A [`Job`] is a cheap-to-copy, typed handle over the tail of an executor
//! chain. Combinators never run anything; they assemble new executors and
//! return a new handle, so jobs can be stored, shared and executed any number
//! of times. [`Job::exec`] instantiates a fresh execution chain per call;
//! concurrent runs of the same job share only the immutable executors.
//!
//! # Examples
//!
//! ```rust
//! use kasync::value;
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let job = value(42)
//!     .then(|v| format!("Result is {v}"))
//!     .then(|s: String| s.to_uppercase());
//!
//! let future = job.exec();
//! assert_eq!(future.value().as_deref(), Some("RESULT IS 42"));
//! # }
//! ```
//!
//! Error handling is part of the chain: a failing step makes plain
//! continuations downstream skip, while the `*_with_error` variants always
//! run and may recover by finishing without an error.
//!
//! ```rust
//! use kasync::{start, Error, Future};
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let job = start(|f: Future<i32>| f.set_error(Error::new(1, "no backend")))
//!     .then(|v| v + 1) // skipped
//!     .then_with_error(|error, _v| if error.is_error() { -1 } else { 0 });
//!
//! assert_eq!(job.exec().value(), Some(-1));
//! # }
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use crate::combinator::{for_each, serial_for_each};
use crate::continuation::{Continuation, ExecutionFlag};
use crate::error::Error;
use crate::execution::ExecutionContext;
use crate::executor::{Executor, ExecutorNode};
use crate::future::Future;

/// Values that can travel through a job chain.
///
/// Implemented for every `Clone + Default + Send + Sync + 'static` type.
/// `Default` supplies the input of a step whose predecessor finished without
/// a value, for example after an upstream error reaches an error-aware
/// continuation.
pub trait JobValue: Clone + Default + Send + Sync + 'static {}

impl<T: Clone + Default + Send + Sync + 'static> JobValue for T {}

/// A typed, value-like handle over an assembled pipeline.
///
/// `Out` is the type the tail step produces; `In` is the input the head step
/// consumes (`()` for self-contained chains). Cloning a job clones the
/// handle, not the pipeline: clones and derived jobs share executors, which
/// makes branching from a common prefix cheap.
///
/// Nothing runs until [`exec`](Self::exec) or [`exec_with`](Self::exec_with)
/// is called. A running pipeline keeps itself alive, so the handle and the
/// returned future may both be dropped without aborting it.
#[must_use]
pub struct Job<Out, In = ()> {
    executor: Arc<dyn ExecutorNode>,
    _types: PhantomData<fn(In) -> Out>,
}

impl<Out, In> Clone for Job<Out, In> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            _types: PhantomData,
        }
    }
}

impl<Out: JobValue, In: JobValue> Job<Out, In> {
    pub(crate) fn from_executor(executor: Arc<dyn ExecutorNode>) -> Self {
        Self {
            executor,
            _types: PhantomData,
        }
    }

    pub(crate) fn from_continuation(
        continuation: Continuation<Out, In>,
        flag: ExecutionFlag,
    ) -> Self {
        Self::from_executor(Arc::new(Executor::new(continuation, None, flag)))
    }

    fn then_impl<U: JobValue>(
        &self,
        continuation: Continuation<U, Out>,
        flag: ExecutionFlag,
    ) -> Job<U, In> {
        Job::from_executor(Arc::new(Executor::new(
            continuation,
            Some(self.executor.clone()),
            flag,
        )))
    }

    /// Append a synchronous step. Skipped when an upstream error is live.
    pub fn then<U, F>(&self, body: F) -> Job<U, In>
    where
        U: JobValue,
        F: Fn(Out) -> U + Send + Sync + 'static,
    {
        self.then_impl(
            Continuation::Sync(Box::new(body)),
            ExecutionFlag::GoodOnly,
        )
    }

    /// Append a callback-driven step: the continuation receives the output
    /// future and may complete it later. Skipped on upstream error.
    pub fn then_async<U, F>(&self, body: F) -> Job<U, In>
    where
        U: JobValue,
        F: Fn(Out, Future<U>) + Send + Sync + 'static,
    {
        self.then_impl(
            Continuation::Async(Box::new(body)),
            ExecutionFlag::GoodOnly,
        )
    }

    /// Append a step that produces a nested job; the nested pipeline runs and
    /// its result becomes this step's result. Skipped on upstream error.
    pub fn then_job<U, F>(&self, body: F) -> Job<U, In>
    where
        U: JobValue,
        F: Fn(Out) -> Job<U> + Send + Sync + 'static,
    {
        self.then_impl(Continuation::Job(Box::new(body)), ExecutionFlag::GoodOnly)
    }

    /// Append a synchronous step that always runs and observes the upstream
    /// error (the zero error on success). Finishing without an error
    /// recovers the chain: downstream plain steps run again.
    pub fn then_with_error<U, F>(&self, body: F) -> Job<U, In>
    where
        U: JobValue,
        F: Fn(Error, Out) -> U + Send + Sync + 'static,
    {
        self.then_impl(
            Continuation::SyncWithError(Box::new(body)),
            ExecutionFlag::Always,
        )
    }

    /// Append an always-run callback-driven step observing the upstream
    /// error.
    pub fn then_async_with_error<U, F>(&self, body: F) -> Job<U, In>
    where
        U: JobValue,
        F: Fn(Error, Out, Future<U>) + Send + Sync + 'static,
    {
        self.then_impl(
            Continuation::AsyncWithError(Box::new(body)),
            ExecutionFlag::Always,
        )
    }

    /// Append an always-run step producing a nested job from the upstream
    /// error and value.
    pub fn then_job_with_error<U, F>(&self, body: F) -> Job<U, In>
    where
        U: JobValue,
        F: Fn(Error, Out) -> Job<U> + Send + Sync + 'static,
    {
        self.then_impl(
            Continuation::JobWithError(Box::new(body)),
            ExecutionFlag::Always,
        )
    }

    /// Sequence another job after this one.
    ///
    /// Prepends this job's executor chain in front of `other`'s head and
    /// returns a handle on the composed chain; `other`'s head input type must
    /// equal this job's output type. Note that the link is recorded on the
    /// shared chain, so `other` itself observes the composition afterwards.
    pub fn chain<U: JobValue>(&self, other: &Job<U, Out>) -> Job<U, In> {
        other.executor.prepend(self.executor.clone());
        Job::from_executor(other.executor.clone())
    }

    /// Observe an upstream error without consuming it.
    ///
    /// The handler runs only on the error path; the error is re-emitted
    /// afterwards, and on the good path the value passes through untouched.
    pub fn on_error<F>(&self, handler: F) -> Job<Out, In>
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.then_impl(
            Continuation::AsyncWithError(Box::new(move |error, _input: Out, future| {
                handler(&error);
                future.set_error(error);
            })),
            ExecutionFlag::ErrorOnly,
        )
    }

    /// Run `body` once per element of this job's output, all elements in
    /// flight at once. Outputs are collected in element order; per-element
    /// failures are accumulated on the aggregate future.
    pub fn each<U, V, F>(&self, body: F) -> Job<Vec<U>, In>
    where
        Out: IntoIterator<Item = V>,
        U: JobValue,
        V: JobValue,
        F: Fn(V) -> Job<U> + Send + Sync + 'static,
    {
        self.each_job(Job::from_continuation(
            Continuation::Job(Box::new(body)),
            ExecutionFlag::GoodOnly,
        ))
    }

    /// [`each`](Self::each) with a prebuilt per-element job.
    pub fn each_job<U, V>(&self, inner: Job<U, V>) -> Job<Vec<U>, In>
    where
        Out: IntoIterator<Item = V>,
        U: JobValue,
        V: JobValue,
    {
        self.chain(&for_each::<Out, U, V>(inner))
    }

    /// Run `body` once per element, strictly one after another: the job for
    /// element K+1 is only created once element K's future finished.
    pub fn serial_each<U, V, F>(&self, body: F) -> Job<Vec<U>, In>
    where
        Out: IntoIterator<Item = V>,
        U: JobValue,
        V: JobValue,
        F: Fn(V) -> Job<U> + Send + Sync + 'static,
    {
        self.serial_each_job(Job::from_continuation(
            Continuation::Job(Box::new(body)),
            ExecutionFlag::GoodOnly,
        ))
    }

    /// [`serial_each`](Self::serial_each) with a prebuilt per-element job.
    pub fn serial_each_job<U, V>(&self, inner: Job<U, V>) -> Job<Vec<U>, In>
    where
        Out: IntoIterator<Item = V>,
        U: JobValue,
        V: JobValue,
    {
        self.chain(&serial_for_each::<Out, U, V>(inner))
    }

    /// Fold this job's container output into a single value.
    ///
    /// Statically requires the output to be iterable; the continuation
    /// receives the whole container.
    pub fn reduce<U, F>(&self, fold: F) -> Job<U, In>
    where
        Out: IntoIterator,
        U: JobValue,
        F: Fn(Out) -> U + Send + Sync + 'static,
    {
        self.then_impl(
            Continuation::Sync(Box::new(fold)),
            ExecutionFlag::GoodOnly,
        )
    }

    /// Callback-driven [`reduce`](Self::reduce).
    pub fn reduce_async<U, F>(&self, fold: F) -> Job<U, In>
    where
        Out: IntoIterator,
        U: JobValue,
        F: Fn(Out, Future<U>) + Send + Sync + 'static,
    {
        self.then_impl(
            Continuation::Async(Box::new(fold)),
            ExecutionFlag::GoodOnly,
        )
    }

    /// Keep `value` alive for as long as executions of this job run.
    ///
    /// The engine never reads the value; use this to pin helper objects the
    /// continuations rely on.
    pub fn add_to_context<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.executor.add_context(Box::new(value));
        self
    }

    /// Attach a cancellation guard.
    ///
    /// The engine only keeps a weak reference. Once `sentinel` is dropped,
    /// every not-yet-run step of a running pipeline short-circuits: its
    /// future finishes with no value and no error.
    pub fn guard<T: Send + Sync + 'static>(self, sentinel: &Arc<T>) -> Self {
        let sentinel: Arc<dyn Any + Send + Sync> = sentinel.clone();
        let weak: Weak<dyn Any + Send + Sync> = Arc::downgrade(&sentinel);
        self.executor.add_guard(weak);
        self
    }

    /// Start one execution of the pipeline and return its tail future.
    ///
    /// May be called any number of times; every call produces an independent
    /// execution chain.
    pub fn exec(&self) -> Future<Out> {
        self.exec_internal(None)
    }

    /// Start one execution, feeding `initial` to the head step.
    ///
    /// The value travels in the per-run execution context rather than
    /// through the shared executor chain, so concurrent runs with different
    /// initial values do not interfere.
    pub fn exec_with(&self, initial: In) -> Future<Out> {
        let initial: Arc<dyn Any + Send + Sync> = Arc::new(initial);
        self.exec_internal(Some(initial))
    }

    fn exec_internal(&self, initial: Option<Arc<dyn Any + Send + Sync>>) -> Future<Out> {
        let ctx = Arc::new(ExecutionContext::new(initial));
        let execution = self.executor.clone().exec_node(&ctx);
        execution.typed_result::<Out>().unwrap_or_default()
    }
}

/// Start a chain with a callback-driven continuation.
///
/// The continuation receives the future to complete, immediately or later:
///
/// ```rust
/// use kasync::{start, Future};
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() {
/// let job = start(|f: Future<u8>| f.set_result(1));
/// assert_eq!(job.exec().value(), Some(1));
/// # }
/// ```
pub fn start<Out, F>(body: F) -> Job<Out>
where
    Out: JobValue,
    F: Fn(Future<Out>) + Send + Sync + 'static,
{
    Job::from_continuation(
        Continuation::Async(Box::new(move |_: (), future| body(future))),
        ExecutionFlag::GoodOnly,
    )
}

/// [`start`] for a head step that consumes an input, supplied later through
/// [`Job::exec_with`] or by sequencing with [`Job::chain`].
pub fn start_with<Out, In, F>(body: F) -> Job<Out, In>
where
    Out: JobValue,
    In: JobValue,
    F: Fn(In, Future<Out>) + Send + Sync + 'static,
{
    Job::from_continuation(Continuation::Async(Box::new(body)), ExecutionFlag::GoodOnly)
}

/// A job that finishes immediately with `value`.
pub fn value<Out: JobValue>(value: Out) -> Job<Out> {
    Job::from_continuation(
        Continuation::Sync(Box::new(move |_: ()| value.clone())),
        ExecutionFlag::GoodOnly,
    )
}

/// A job that finishes immediately with the unit value. An async no-op.
pub fn null() -> Job<()> {
    value(())
}

/// A job that finishes immediately with `error`.
pub fn error<Out: JobValue>(error: Error) -> Job<Out> {
    Job::from_continuation(
        Continuation::Async(Box::new(move |_: (), future: Future<Out>| {
            future.set_error(error.clone())
        })),
        ExecutionFlag::GoodOnly,
    )
}
