//! Pipeline nodes and the chained execution driver.
//!
//! An [`Executor`] is one immutable node of the compiled pipeline: a
//! continuation, an execution flag, and an owning link to its predecessor.
//! Jobs only assemble executors; nothing runs until
//! [`Job::exec`](crate::Job::exec) walks the chain and instantiates one
//! [`Execution`] per node, head first. Each step is driven once its
//! predecessor's future finishes, either directly when it already has or
//! through a one-shot ready subscription otherwise.

use std::any::{type_name, Any};
use std::sync::{Arc, Mutex, Weak};

use crate::continuation::{Continuation, ExecutionFlag};
use crate::execution::{Execution, ExecutionContext};
use crate::future::{Future, FutureHandle};
use crate::job::{Job, JobValue};

/// Type-erased link in the executor chain.
///
/// The chain mixes nodes of different input and output types; successors hold
/// their predecessor behind this trait and recover typed futures by downcast
/// where the types meet.
pub(crate) trait ExecutorNode: Send + Sync {
    /// Instantiate and drive one execution of this node, recursing into the
    /// predecessor chain first.
    fn exec_node(self: Arc<Self>, ctx: &Arc<ExecutionContext>) -> Arc<Execution>;

    fn prev(&self) -> Option<Arc<dyn ExecutorNode>>;
    fn set_prev(&self, prev: Arc<dyn ExecutorNode>);
    fn add_context(&self, value: Box<dyn Any + Send + Sync>);
    fn add_guard(&self, guard: Weak<dyn Any + Send + Sync>);
    fn name(&self) -> &str;

    /// Walk to the head of this chain and attach `head_prev` in front of it.
    fn prepend(&self, head_prev: Arc<dyn ExecutorNode>) {
        match self.prev() {
            Some(prev) => prev.prepend(head_prev),
            None => self.set_prev(head_prev),
        }
    }
}

/// A pipeline node producing `Out` from an input of type `In`.
pub(crate) struct Executor<Out, In> {
    continuation: Continuation<Out, In>,
    flag: ExecutionFlag,
    name: String,
    prev: Mutex<Option<Arc<dyn ExecutorNode>>>,
    context: Mutex<Vec<Box<dyn Any + Send + Sync>>>,
    guards: Mutex<Vec<Weak<dyn Any + Send + Sync>>>,
}

impl<Out: JobValue, In: JobValue> Executor<Out, In> {
    pub(crate) fn new(
        continuation: Continuation<Out, In>,
        prev: Option<Arc<dyn ExecutorNode>>,
        flag: ExecutionFlag,
    ) -> Self {
        let name = format!(
            "Executor[{}]<{}, {}>",
            continuation.label(),
            type_name::<In>(),
            type_name::<Out>()
        );
        Self {
            continuation,
            flag,
            name,
            prev: Mutex::new(prev),
            context: Mutex::new(Vec::new()),
            guards: Mutex::new(Vec::new()),
        }
    }

    /// Apply the gating protocol, then run the continuation if the step is
    /// eligible.
    fn run_execution(
        &self,
        prev: Option<&Arc<dyn FutureHandle>>,
        execution: &Arc<Execution>,
        ctx: &Arc<ExecutionContext>,
    ) {
        let Some(own) = execution.result_handle() else {
            return;
        };
        if ctx.guard_is_broken() {
            // Cancelled: finish untouched, no value and no synthesized error.
            own.mark_finished();
            return;
        }
        if let Some(prev) = prev {
            if prev.has_error() && self.flag == ExecutionFlag::GoodOnly {
                // Skipped step: forward the first upstream error.
                own.fail(prev.first_error().unwrap_or_default());
                return;
            }
            if !prev.has_error() && self.flag == ExecutionFlag::ErrorOnly {
                self.forward_value(prev, &own);
                own.mark_finished();
                return;
            }
        }
        self.run(prev, execution, ctx);
    }

    /// Copy the predecessor's value onto this step's future. Only applies
    /// when both types coincide, which holds for every error-only step the
    /// public API can construct.
    fn forward_value(&self, prev: &Arc<dyn FutureHandle>, own: &Arc<dyn FutureHandle>) {
        let prev_typed = prev.as_any().downcast_ref::<Future<In>>();
        let own_typed = own.as_any().downcast_ref::<Future<In>>();
        if let (Some(prev), Some(own)) = (prev_typed, own_typed) {
            if let Some(value) = prev.value() {
                own.set_value(value);
            }
        }
    }

    /// Dispatch on the continuation variant.
    fn run(
        &self,
        prev: Option<&Arc<dyn FutureHandle>>,
        execution: &Arc<Execution>,
        ctx: &Arc<ExecutionContext>,
    ) {
        let Some(future) = execution.typed_result::<Out>() else {
            return;
        };
        let input: In = match prev {
            Some(handle) => handle
                .as_any()
                .downcast_ref::<Future<In>>()
                .and_then(|typed| typed.value())
                .unwrap_or_default(),
            None => ctx.initial_value::<In>().unwrap_or_default(),
        };
        let error = prev
            .and_then(|handle| handle.first_error())
            .unwrap_or_default();
        match &self.continuation {
            Continuation::Async(continuation) => continuation(input, future),
            Continuation::AsyncWithError(continuation) => continuation(error, input, future),
            Continuation::Sync(continuation) => future.set_result(continuation(input)),
            Continuation::SyncWithError(continuation) => {
                future.set_result(continuation(error, input))
            }
            Continuation::Job(continuation) => Self::run_nested(continuation(input), future),
            Continuation::JobWithError(continuation) => {
                Self::run_nested(continuation(error, input), future)
            }
        }
    }

    /// Execute a nested job and thread its completion, value or error, onto
    /// the outer step's future.
    fn run_nested(nested: Job<Out>, target: Future<Out>) {
        let inner = nested.exec();
        let completed = inner.clone();
        inner.subscribe(Box::new(move || {
            if let Some(error) = completed.first_error() {
                target.set_error(error);
            } else {
                if let Some(value) = completed.value() {
                    target.set_value(value);
                }
                target.set_finished();
            }
        }));
    }
}

impl<Out: JobValue, In: JobValue> ExecutorNode for Executor<Out, In> {
    fn exec_node(self: Arc<Self>, ctx: &Arc<ExecutionContext>) -> Arc<Execution> {
        // One executor per step, created when the job is assembled; one
        // execution per step per run. The execution holds `self`, so the
        // chain outlives any dropped user handles until the run completes.
        let execution = Execution::new(self.clone());

        ctx.add_guards(&self.guards.lock().unwrap());

        let prev_node = self.prev.lock().unwrap().clone();
        if let Some(prev) = prev_node {
            execution.link_prev(prev.exec_node(ctx));
        }

        let future = Future::<Out>::new();
        execution.set_result(Arc::new(future.clone()));

        // The engine watches the step's own future to learn that the step
        // completed and to release the execution chain afterwards.
        {
            let execution = execution.clone();
            future.subscribe(Box::new(move || execution.set_finished()));
        }

        match execution.prev_result() {
            None => self.run_execution(None, &execution, ctx),
            Some(prev_future) if prev_future.is_finished() => {
                self.run_execution(Some(&prev_future), &execution, ctx)
            }
            Some(prev_future) => {
                let this = self.clone();
                let pending_execution = execution.clone();
                let pending_ctx = ctx.clone();
                let pending = prev_future.clone();
                prev_future.on_ready(Box::new(move || {
                    this.run_execution(Some(&pending), &pending_execution, &pending_ctx)
                }));
            }
        }

        execution
    }

    fn prev(&self) -> Option<Arc<dyn ExecutorNode>> {
        self.prev.lock().unwrap().clone()
    }

    fn set_prev(&self, prev: Arc<dyn ExecutorNode>) {
        *self.prev.lock().unwrap() = Some(prev);
    }

    fn add_context(&self, value: Box<dyn Any + Send + Sync>) {
        self.context.lock().unwrap().push(value);
    }

    fn add_guard(&self, guard: Weak<dyn Any + Send + Sync>) {
        self.guards.lock().unwrap().push(guard);
    }

    fn name(&self) -> &str {
        &self.name
    }
}
