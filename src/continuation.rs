//! Step bodies and their execution gating.
//!
//! Every pipeline step carries exactly one continuation out of six shapes,
//! distinguished by how the result is produced (direct return, writing to a
//! provided future, or a nested job) and by whether the upstream error is
//! observed. Dispatch happens by variant tag at run time; there is no dynamic
//! dispatch over a step-trait hierarchy.

use crate::error::Error;
use crate::future::Future;
use crate::job::Job;

/// `(In, out Future<Out>)`, may complete the future later.
pub(crate) type AsyncFn<Out, In> = Box<dyn Fn(In, Future<Out>) + Send + Sync>;

/// `(Error, In, out Future<Out>)`, always invoked.
pub(crate) type AsyncErrorFn<Out, In> = Box<dyn Fn(Error, In, Future<Out>) + Send + Sync>;

/// `(In) -> Out`, value returning.
pub(crate) type SyncFn<Out, In> = Box<dyn Fn(In) -> Out + Send + Sync>;

/// `(Error, In) -> Out`, always invoked; receives the zero error on success.
pub(crate) type SyncErrorFn<Out, In> = Box<dyn Fn(Error, In) -> Out + Send + Sync>;

/// `(In) -> Job<Out>`, produces a nested pipeline.
pub(crate) type JobFn<Out, In> = Box<dyn Fn(In) -> Job<Out> + Send + Sync>;

/// `(Error, In) -> Job<Out>`, always invoked.
pub(crate) type JobErrorFn<Out, In> = Box<dyn Fn(Error, In) -> Job<Out> + Send + Sync>;

/// The body of one pipeline step.
pub(crate) enum Continuation<Out, In> {
    Async(AsyncFn<Out, In>),
    AsyncWithError(AsyncErrorFn<Out, In>),
    Sync(SyncFn<Out, In>),
    SyncWithError(SyncErrorFn<Out, In>),
    Job(JobFn<Out, In>),
    JobWithError(JobErrorFn<Out, In>),
}

impl<Out, In> Continuation<Out, In> {
    /// Short variant label used in executor display names.
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Continuation::Async(_) => "async",
            Continuation::AsyncWithError(_) => "async+err",
            Continuation::Sync(_) => "sync",
            Continuation::SyncWithError(_) => "sync+err",
            Continuation::Job(_) => "job",
            Continuation::JobWithError(_) => "job+err",
        }
    }
}

/// When a step runs relative to the upstream error state.
///
/// Plain continuations run only on the good path, error-aware ones always;
/// `on_error` steps run only on the error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionFlag {
    Always,
    ErrorOnly,
    GoodOnly,
}
