//! One-shot subscription to a future's completion and progress.

use std::sync::{Arc, Mutex};

use crate::future::Future;
use crate::job::JobValue;

/// A one-shot subscriber delivering ready and progress notifications for one
/// [`Future`].
///
/// Build the watcher with its callbacks, then arm it with
/// [`watch`](Self::watch). The ready callback fires exactly once, immediately
/// if the future already finished. Dropping the watcher guarantees that none
/// of its callbacks run afterwards, which makes it safe to subscribe from
/// objects with a shorter lifetime than the pipeline.
///
/// # Examples
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use kasync::{Future, FutureWatcher};
///
/// let future = Future::<i32>::new();
/// let seen = Arc::new(Mutex::new(None));
///
/// let sink = seen.clone();
/// let observed = future.clone();
/// let watcher = FutureWatcher::new()
///     .on_ready(move || *sink.lock().unwrap() = observed.value());
/// watcher.watch(&future);
///
/// future.set_result(5);
/// assert_eq!(*seen.lock().unwrap(), Some(5));
/// ```
pub struct FutureWatcher<T> {
    token: Arc<()>,
    ready: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    progress: Mutex<Option<Arc<dyn Fn(f64) + Send + Sync>>>,
    future: Mutex<Option<Future<T>>>,
}

impl<T: JobValue> Default for FutureWatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: JobValue> FutureWatcher<T> {
    /// Create an unarmed watcher.
    pub fn new() -> Self {
        Self {
            token: Arc::new(()),
            ready: Mutex::new(None),
            progress: Mutex::new(None),
            future: Mutex::new(None),
        }
    }

    /// Set the callback invoked once the watched future finishes.
    pub fn on_ready<F>(self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        *self.ready.lock().unwrap() = Some(Box::new(callback));
        self
    }

    /// Set the callback invoked on every progress report.
    pub fn on_progress<F>(self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        *self.progress.lock().unwrap() = Some(Arc::new(callback));
        self
    }

    /// Start watching `future`.
    ///
    /// Registers the configured callbacks; the ready callback fires right
    /// away when the future already finished.
    pub fn watch(&self, future: &Future<T>) {
        *self.future.lock().unwrap() = Some(future.clone());
        if let Some(progress) = self.progress.lock().unwrap().clone() {
            future.subscribe_progress(Arc::downgrade(&self.token), progress);
        }
        if let Some(ready) = self.ready.lock().unwrap().take() {
            let token = Arc::downgrade(&self.token);
            future.subscribe(Box::new(move || {
                if token.strong_count() > 0 {
                    ready();
                }
            }));
        }
    }

    /// The future currently being watched, if any.
    pub fn future(&self) -> Option<Future<T>> {
        self.future.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn ready_fires_once_on_completion() {
        let future = Future::<()>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let count = fired.clone();
        let watcher = FutureWatcher::new().on_ready(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        watcher.watch(&future);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        future.set_finished();
        future.set_finished();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ready_fires_immediately_for_finished_future() {
        let future = Future::<i32>::new();
        future.set_result(1);
        let fired = Arc::new(AtomicUsize::new(0));
        let count = fired.clone();
        FutureWatcher::new()
            .on_ready(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
            .watch(&future);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_watcher_never_fires() {
        let future = Future::<()>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let count = fired.clone();
        let watcher = FutureWatcher::new().on_ready(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        watcher.watch(&future);
        drop(watcher);
        future.set_finished();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn progress_reaches_live_watcher() {
        let future = Future::<()>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let watcher = FutureWatcher::new().on_progress(move |fraction| {
            sink.lock().unwrap().push(fraction);
        });
        watcher.watch(&future);
        future.set_progress(0.5);
        future.set_progress(0.75);
        assert_eq!(*seen.lock().unwrap(), vec![0.5, 0.75]);
    }

    #[test]
    fn exposes_watched_future() {
        let future = Future::<i32>::new();
        let watcher = FutureWatcher::new();
        assert!(watcher.future().is_none());
        watcher.watch(&future);
        future.set_result(3);
        assert_eq!(watcher.future().and_then(|f| f.value()), Some(3));
    }
}
