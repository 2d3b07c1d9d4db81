//! Per-run state of a pipeline.
//!
//! Each call to [`Job::exec`](crate::Job::exec) instantiates one [`Execution`]
//! per executor in the chain. The execution chain owns the executor chain for
//! the duration of the run, so dropping every user-visible handle cannot free
//! a pipeline that is still in flight.

use std::any::Any;
use std::sync::{Arc, Mutex, Weak};

use crate::executor::ExecutorNode;
use crate::future::{Future, FutureHandle};
use crate::job::JobValue;
use crate::trace::Tracer;

/// The running instance of one executor.
///
/// Owns its executor and its predecessor execution; the chain is released as
/// a whole once the tail future finishes and the engine's own ready
/// subscription drops the last strong reference.
pub(crate) struct Execution {
    #[allow(dead_code)]
    executor: Arc<dyn ExecutorNode>,
    prev: Mutex<Option<Arc<Execution>>>,
    result: Mutex<Option<Arc<dyn FutureHandle>>>,
    tracer: Mutex<Option<Tracer>>,
}

impl Execution {
    pub(crate) fn new(executor: Arc<dyn ExecutorNode>) -> Arc<Self> {
        let tracer = Tracer::new(executor.name());
        Arc::new(Self {
            executor,
            prev: Mutex::new(None),
            result: Mutex::new(None),
            tracer: Mutex::new(Some(tracer)),
        })
    }

    pub(crate) fn link_prev(&self, prev: Arc<Execution>) {
        *self.prev.lock().unwrap() = Some(prev);
    }

    pub(crate) fn prev_result(&self) -> Option<Arc<dyn FutureHandle>> {
        self.prev
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|prev| prev.result_handle())
    }

    pub(crate) fn set_result(&self, handle: Arc<dyn FutureHandle>) {
        *self.result.lock().unwrap() = Some(handle);
    }

    pub(crate) fn result_handle(&self) -> Option<Arc<dyn FutureHandle>> {
        self.result.lock().unwrap().clone()
    }

    /// The step's own future, recovered with its concrete type.
    pub(crate) fn typed_result<T: JobValue>(&self) -> Option<Future<T>> {
        self.result
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|handle| handle.as_any().downcast_ref::<Future<T>>().cloned())
    }

    /// Marks the step complete; ends the trace span for this execution.
    pub(crate) fn set_finished(&self) {
        self.tracer.lock().unwrap().take();
    }
}

/// State shared by every execution of one run.
///
/// Collects the guard set while the chain is walked and carries the value
/// injected by [`Job::exec_with`](crate::Job::exec_with) for the head step.
/// Using the context for the initial value keeps the shared executor chain
/// immutable, so concurrent runs of the same job cannot interfere.
pub(crate) struct ExecutionContext {
    guards: Mutex<Vec<Weak<dyn Any + Send + Sync>>>,
    initial: Option<Arc<dyn Any + Send + Sync>>,
}

impl ExecutionContext {
    pub(crate) fn new(initial: Option<Arc<dyn Any + Send + Sync>>) -> Self {
        Self {
            guards: Mutex::new(Vec::new()),
            initial,
        }
    }

    pub(crate) fn add_guards(&self, guards: &[Weak<dyn Any + Send + Sync>]) {
        self.guards.lock().unwrap().extend_from_slice(guards);
    }

    /// Whether any guarded sentinel has been destroyed.
    pub(crate) fn guard_is_broken(&self) -> bool {
        self.guards
            .lock()
            .unwrap()
            .iter()
            .any(|guard| guard.strong_count() == 0)
    }

    /// The injected head input, when present and of the expected type.
    pub(crate) fn initial_value<T: JobValue>(&self) -> Option<T> {
        self.initial
            .as_ref()
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }
}
