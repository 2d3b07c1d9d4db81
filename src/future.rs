//! Shared completion cells for job results.
//!
//! A [`Future`] is the handle through which a running job delivers its result.
//! It is a cheap-to-clone shared cell that moves from *pending* to *finished*
//! exactly once, carrying an optional value and an ordered list of
//! [`Error`]s. Continuations receive a `Future` to fill in; callers receive
//! one from [`Job::exec`](crate::Job::exec) to observe the overall outcome.
//!
//! Completion is delivered synchronously: the ready callbacks registered on a
//! future run in the same turn in which [`Future::set_finished`] is called, in
//! registration order. Nothing ever crosses to another task behind the
//! caller's back; [`Future::wait_for_finished`] is the only suspension point
//! and it merely parks the caller until the cell transitions.
//!
//! # Examples
//!
//! ```rust
//! use kasync::{start, Future};
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let job = start(|future: Future<i32>| {
//!     // Hand the future to any completion source; here we finish inline.
//!     future.set_result(42);
//! });
//!
//! let result = job.exec();
//! assert!(result.is_finished());
//! assert_eq!(result.value(), Some(42));
//! # }
//! ```

use std::any::Any;
use std::sync::{Arc, Mutex, Weak};

use crate::error::Error;
use crate::job::JobValue;

/// One-shot callback invoked when a future finishes.
pub(crate) type ReadyCallback = Box<dyn FnOnce() + Send>;

/// Repeating callback invoked on progress updates, guarded by a liveness
/// token so that dropped watchers never fire.
pub(crate) type ProgressCallback = (Weak<()>, Arc<dyn Fn(f64) + Send + Sync>);

struct FutureState<T> {
    finished: bool,
    value: Option<T>,
    errors: Vec<Error>,
    ready: Vec<ReadyCallback>,
    progress: Vec<ProgressCallback>,
}

/// The eventual result of a job execution.
///
/// `Future<T>` is a shared handle; clones observe and mutate the same cell.
/// The producing side uses [`set_value`](Self::set_value) /
/// [`set_finished`](Self::set_finished) / [`set_error`](Self::set_error),
/// consumers use the observation methods or a
/// [`FutureWatcher`](crate::FutureWatcher).
///
/// A future transitions to finished exactly once; later transition attempts
/// are ignored and watchers fire a single time.
pub struct Future<T> {
    state: Arc<Mutex<FutureState<T>>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: JobValue> Default for Future<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: JobValue> Future<T> {
    /// Create a detached pending future.
    ///
    /// Detached futures are completed by external sources, for example the
    /// inputs to [`wait_for_completion`](crate::wait_for_completion).
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FutureState {
                finished: false,
                value: None,
                errors: Vec::new(),
                ready: Vec::new(),
                progress: Vec::new(),
            })),
        }
    }

    /// Record the result value. Only valid while pending; ignored afterwards.
    ///
    /// Call [`set_finished`](Self::set_finished) afterwards to publish the
    /// result, or use [`set_result`](Self::set_result) to do both at once.
    pub fn set_value(&self, value: T) {
        let mut state = self.state.lock().unwrap();
        if state.finished {
            return;
        }
        state.value = Some(value);
    }

    /// Transition to finished and notify every registered ready callback.
    ///
    /// Idempotent: a second call is a no-op and callbacks fire exactly once,
    /// in registration order.
    pub fn set_finished(&self) {
        let callbacks = {
            let mut state = self.state.lock().unwrap();
            if state.finished {
                return;
            }
            state.finished = true;
            std::mem::take(&mut state.ready)
        };
        for callback in callbacks {
            callback();
        }
    }

    /// Store `value` and finish in one step.
    pub fn set_result(&self, value: T) {
        self.set_value(value);
        self.set_finished();
    }

    /// Fail the future with `error` and finish it.
    ///
    /// Replaces any errors recorded so far; use [`add_error`](Self::add_error)
    /// to accumulate instead.
    pub fn set_error(&self, error: Error) {
        {
            let mut state = self.state.lock().unwrap();
            if state.finished {
                return;
            }
            state.errors.clear();
            state.errors.push(error);
        }
        self.set_finished();
    }

    /// Append `error` without finishing.
    ///
    /// Aggregating combinators use this to record one error per failed
    /// element before finishing the collecting future.
    pub fn add_error(&self, error: Error) {
        let mut state = self.state.lock().unwrap();
        if state.finished {
            return;
        }
        state.errors.push(error);
    }

    /// Drop all recorded errors.
    pub fn clear_errors(&self) {
        self.state.lock().unwrap().errors.clear();
    }

    /// Whether the future has finished (with or without errors).
    pub fn is_finished(&self) -> bool {
        self.state.lock().unwrap().finished
    }

    /// Whether at least one error has been recorded.
    pub fn has_error(&self) -> bool {
        !self.state.lock().unwrap().errors.is_empty()
    }

    /// Code of the first recorded error, `0` if none.
    pub fn error_code(&self) -> i32 {
        self.state
            .lock()
            .unwrap()
            .errors
            .first()
            .map(|e| e.code)
            .unwrap_or(0)
    }

    /// Message of the first recorded error, empty if none.
    pub fn error_message(&self) -> String {
        self.state
            .lock()
            .unwrap()
            .errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_default()
    }

    /// All recorded errors, in the order they were added.
    pub fn errors(&self) -> Vec<Error> {
        self.state.lock().unwrap().errors.clone()
    }

    /// The result value, if one has been recorded.
    ///
    /// `None` while pending, and also when the producing step was skipped by
    /// a broken guard or finished with an error. The absence of a value is
    /// how cancellation is observed.
    pub fn value(&self) -> Option<T> {
        self.state.lock().unwrap().value.clone()
    }

    /// Report progress as a fraction in `0.0..=1.0`.
    ///
    /// Non-terminal and advisory: watchers are notified in call order, the
    /// value is not stored and no monotonicity is enforced.
    pub fn set_progress(&self, fraction: f64) {
        let callbacks: Vec<ProgressCallback> = self.state.lock().unwrap().progress.clone();
        for (token, callback) in callbacks {
            if token.strong_count() > 0 {
                callback(fraction);
            }
        }
    }

    /// Report progress as `processed` out of `total` steps.
    pub fn set_progress_steps(&self, processed: usize, total: usize) {
        if total == 0 {
            return;
        }
        self.set_progress(processed as f64 / total as f64);
    }

    /// Suspend the caller until the future finishes.
    ///
    /// Intended for top-level test or CLI code. Returns immediately when the
    /// future already finished.
    pub async fn wait_for_finished(&self) {
        if self.is_finished() {
            return;
        }
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        self.subscribe(Box::new(move || {
            let _ = tx.send(());
        }));
        let _ = rx.await;
    }

    /// Register a one-shot ready callback.
    ///
    /// Fires immediately when the future already finished, otherwise when it
    /// does. Callbacks run outside the internal lock, so they may freely
    /// touch this or other futures.
    pub(crate) fn subscribe(&self, callback: ReadyCallback) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.finished {
                state.ready.push(callback);
                return;
            }
        }
        callback();
    }

    /// Register a progress callback gated on a watcher liveness token.
    pub(crate) fn subscribe_progress(
        &self,
        token: Weak<()>,
        callback: Arc<dyn Fn(f64) + Send + Sync>,
    ) {
        self.state.lock().unwrap().progress.push((token, callback));
    }

    /// First recorded error, if any.
    pub(crate) fn first_error(&self) -> Option<Error> {
        self.state.lock().unwrap().errors.first().cloned()
    }
}

/// Type-erased view of a [`Future`] used to link heterogeneously typed steps.
///
/// The execution chain stores each step's future behind this trait; a step
/// recovers its typed predecessor future through [`as_any`](Self::as_any)
/// when the types line up, and falls back to the untyped error/finish
/// operations when they do not (for example a step that takes no input after
/// a value-producing step).
pub(crate) trait FutureHandle: Send + Sync {
    fn is_finished(&self) -> bool;
    fn has_error(&self) -> bool;
    fn first_error(&self) -> Option<Error>;
    fn mark_finished(&self);
    fn fail(&self, error: Error);
    fn on_ready(&self, callback: ReadyCallback);
    fn as_any(&self) -> &dyn Any;
}

impl<T: JobValue> FutureHandle for Future<T> {
    fn is_finished(&self) -> bool {
        Future::is_finished(self)
    }

    fn has_error(&self) -> bool {
        Future::has_error(self)
    }

    fn first_error(&self) -> Option<Error> {
        Future::first_error(self)
    }

    fn mark_finished(&self) {
        self.set_finished();
    }

    fn fail(&self, error: Error) {
        self.set_error(error);
    }

    fn on_ready(&self, callback: ReadyCallback) {
        self.subscribe(callback);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn starts_pending() {
        let future = Future::<i32>::new();
        assert!(!future.is_finished());
        assert!(!future.has_error());
        assert_eq!(future.value(), None);
    }

    #[test]
    fn set_result_finishes_with_value() {
        let future = Future::new();
        future.set_result(7);
        assert!(future.is_finished());
        assert_eq!(future.value(), Some(7));
        assert!(!future.has_error());
    }

    #[test]
    fn set_value_after_finish_is_ignored() {
        let future = Future::new();
        future.set_result(1);
        future.set_value(2);
        assert_eq!(future.value(), Some(1));
    }

    #[test]
    fn set_error_finishes_and_reports_first() {
        let future = Future::<()>::new();
        future.set_error(Error::new(9, "bad"));
        assert!(future.is_finished());
        assert!(future.has_error());
        assert_eq!(future.error_code(), 9);
        assert_eq!(future.error_message(), "bad");
    }

    #[test]
    fn add_error_accumulates_without_finishing() {
        let future = Future::<()>::new();
        future.add_error(Error::new(1, "a"));
        future.add_error(Error::new(2, "b"));
        assert!(!future.is_finished());
        assert_eq!(future.errors().len(), 2);
        assert_eq!(future.error_code(), 1);
        future.clear_errors();
        assert!(!future.has_error());
    }

    #[test]
    fn ready_callbacks_fire_once_in_order() {
        let future = Future::<()>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let fired = fired.clone();
            let order = order.clone();
            future.subscribe(Box::new(move || {
                fired.fetch_add(1, Ordering::SeqCst);
                order.lock().unwrap().push(tag);
            }));
        }
        future.set_finished();
        future.set_finished();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn subscribe_after_finish_fires_immediately() {
        let future = Future::<()>::new();
        future.set_finished();
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = fired.clone();
        future.subscribe(Box::new(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn progress_is_delivered_in_call_order() {
        let future = Future::<()>::new();
        let token = Arc::new(());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        future.subscribe_progress(
            Arc::downgrade(&token),
            Arc::new(move |fraction| sink.lock().unwrap().push(fraction)),
        );
        future.set_progress(0.25);
        future.set_progress_steps(1, 2);
        future.set_progress(0.1);
        assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5, 0.1]);
    }

    #[test]
    fn progress_stops_after_token_drops() {
        let future = Future::<()>::new();
        let token = Arc::new(());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        future.subscribe_progress(
            Arc::downgrade(&token),
            Arc::new(move |fraction| sink.lock().unwrap().push(fraction)),
        );
        future.set_progress(0.5);
        drop(token);
        future.set_progress(1.0);
        assert_eq!(*seen.lock().unwrap(), vec![0.5]);
    }
}
