//! Concurrency primitives built on the core engine.
//!
//! Everything here is expressed through [`Job`] and [`Future`]: timed delays,
//! cooperative loops, parallel and serial per-element application, and a
//! completion barrier over externally produced futures.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::continuation::{Continuation, ExecutionFlag};
use crate::error::Error;
use crate::future::Future;
use crate::job::{start, Job, JobValue};

/// Loop control result for [`do_while`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFlow {
    /// Run another iteration.
    Continue,
    /// Leave the loop.
    #[default]
    Break,
}

/// A job that finishes after `delay_ms` milliseconds.
///
/// The delay is armed when the job executes, as a one-shot timer task on the
/// ambient tokio runtime.
pub fn wait(delay_ms: u64) -> Job<()> {
    start(move |future: Future<()>| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            future.set_finished();
        });
    })
}

/// Run `body` repeatedly until it yields [`ControlFlow::Break`] or fails.
///
/// Each iteration executes the job produced by `body`. An iteration error
/// ends the loop and is forwarded to the loop's future.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use kasync::{do_while, value, ControlFlow};
///
/// # #[tokio::main(flavor = "current_thread")] async fn main() {
/// let counter = Arc::new(Mutex::new(0));
/// let tally = counter.clone();
/// let job = do_while(move || {
///     let mut count = tally.lock().unwrap();
///     *count += 1;
///     let next = if *count < 5 { ControlFlow::Continue } else { ControlFlow::Break };
///     value(next)
/// });
/// job.exec().wait_for_finished().await;
/// assert_eq!(*counter.lock().unwrap(), 5);
/// # }
/// ```
pub fn do_while<F>(body: F) -> Job<()>
where
    F: Fn() -> Job<ControlFlow> + Send + Sync + 'static,
{
    let body: Arc<dyn Fn() -> Job<ControlFlow> + Send + Sync> = Arc::new(body);
    start(move |future| run_loop_iteration(body.clone(), future))
}

fn run_loop_iteration(
    body: Arc<dyn Fn() -> Job<ControlFlow> + Send + Sync>,
    outer: Future<()>,
) {
    let round = body().exec();
    let completed = round.clone();
    round.subscribe(Box::new(move || {
        if let Some(error) = completed.first_error() {
            outer.set_error(error);
        } else if completed.value() == Some(ControlFlow::Continue) {
            run_loop_iteration(body, outer);
        } else {
            outer.set_finished();
        }
    }));
}

/// Apply `inner` to every element of an incoming container, all elements in
/// flight at once.
///
/// One fresh execution of `inner` starts per element, with no ordering among
/// them. Outputs are collected by element index, so the assembled `Vec`
/// always matches the input order. A failed element contributes its first
/// error to the aggregate future instead of an output; the aggregate finishes
/// once every element has, carrying the collected values and the accumulated
/// errors.
///
/// The incoming container arrives as the job's input; sequence it with
/// [`Job::chain`], or use the [`Job::each`] shorthand.
pub fn for_each<L, U, V>(inner: Job<U, V>) -> Job<Vec<U>, L>
where
    L: IntoIterator<Item = V> + JobValue,
    U: JobValue,
    V: JobValue,
{
    Job::from_continuation(
        Continuation::Async(Box::new(move |list: L, future: Future<Vec<U>>| {
            let items: Vec<V> = list.into_iter().collect();
            let total = items.len();
            if total == 0 {
                future.set_result(Vec::new());
                return;
            }
            let slots: Arc<Mutex<Vec<Option<U>>>> = Arc::new(Mutex::new(vec![None; total]));
            let failures: Arc<Mutex<Vec<Error>>> = Arc::new(Mutex::new(Vec::new()));
            let remaining = Arc::new(Mutex::new(total));
            for (index, item) in items.into_iter().enumerate() {
                let element = inner.exec_with(item);
                let completed = element.clone();
                let slots = slots.clone();
                let failures = failures.clone();
                let remaining = remaining.clone();
                let future = future.clone();
                element.subscribe(Box::new(move || {
                    if let Some(error) = completed.first_error() {
                        failures.lock().unwrap().push(error);
                    } else if let Some(value) = completed.value() {
                        slots.lock().unwrap()[index] = Some(value);
                    }
                    let mut left = remaining.lock().unwrap();
                    *left -= 1;
                    if *left > 0 {
                        return;
                    }
                    drop(left);
                    let collected: Vec<U> = slots.lock().unwrap().drain(..).flatten().collect();
                    future.set_value(collected);
                    for error in failures.lock().unwrap().drain(..) {
                        future.add_error(error);
                    }
                    future.set_finished();
                }));
            }
        })),
        ExecutionFlag::GoodOnly,
    )
}

/// Like [`for_each`], but the job for element K+1 is only constructed after
/// element K's future finished.
///
/// Element failures are recorded without aborting the remaining elements; the
/// aggregate future finishes with the collected outputs and reports the first
/// recorded error.
pub fn serial_for_each<L, U, V>(inner: Job<U, V>) -> Job<Vec<U>, L>
where
    L: IntoIterator<Item = V> + JobValue,
    U: JobValue,
    V: JobValue,
{
    Job::from_continuation(
        Continuation::Async(Box::new(move |list: L, future: Future<Vec<U>>| {
            let state = Arc::new(Mutex::new(SerialState {
                queue: list.into_iter().collect(),
                collected: Vec::new(),
                failures: Vec::new(),
            }));
            run_next_element(inner.clone(), state, future);
        })),
        ExecutionFlag::GoodOnly,
    )
}

struct SerialState<U, V> {
    queue: VecDeque<V>,
    collected: Vec<U>,
    failures: Vec<Error>,
}

fn run_next_element<U: JobValue, V: JobValue>(
    inner: Job<U, V>,
    state: Arc<Mutex<SerialState<U, V>>>,
    future: Future<Vec<U>>,
) {
    let next = state.lock().unwrap().queue.pop_front();
    let Some(item) = next else {
        let mut done = state.lock().unwrap();
        future.set_value(std::mem::take(&mut done.collected));
        for error in done.failures.drain(..) {
            future.add_error(error);
        }
        drop(done);
        future.set_finished();
        return;
    };
    let element = inner.exec_with(item);
    let completed = element.clone();
    element.subscribe(Box::new(move || {
        {
            let mut state = state.lock().unwrap();
            if let Some(error) = completed.first_error() {
                state.failures.push(error);
            } else if let Some(value) = completed.value() {
                state.collected.push(value);
            }
        }
        run_next_element(inner, state, future);
    }));
}

/// A job that finishes once every future in `futures` has finished.
///
/// Already-finished inputs count immediately; an empty collection finishes
/// right away. Errors on the inputs are not inspected.
pub fn wait_for_completion(futures: Vec<Future<()>>) -> Job<()> {
    start(move |future: Future<()>| {
        let total = futures.len();
        if total == 0 {
            future.set_finished();
            return;
        }
        let remaining = Arc::new(Mutex::new(total));
        for watched in &futures {
            let remaining = remaining.clone();
            let future = future.clone();
            watched.subscribe(Box::new(move || {
                let mut left = remaining.lock().unwrap();
                *left -= 1;
                if *left == 0 {
                    drop(left);
                    future.set_finished();
                }
            }));
        }
    })
}
