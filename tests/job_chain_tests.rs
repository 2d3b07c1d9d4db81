//! Chained execution: sync and async steps, nested jobs, composition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kasync::{for_each, start, start_with, value, wait, Future};

#[tokio::test]
async fn sync_chain_completes_within_exec() {
    let base = start(|future: Future<i32>| {
        future.set_value(42);
        future.set_finished();
    })
    .then(|v| format!("Result is {v}"));

    let job = base.then(|s: String| s.to_uppercase());

    let future = job.exec();
    assert!(future.is_finished());
    assert_eq!(future.value().as_deref(), Some("RESULT IS 42"));
}

#[tokio::test]
async fn sync_continuations_pass_values_along() {
    let job = value(42).then(|v| v * 2);
    let future = job.exec();
    assert!(future.is_finished());
    assert_eq!(future.value(), Some(84));
}

#[tokio::test(start_paused = true)]
async fn async_head_completes_after_timer() {
    let job = start(|future: Future<i32>| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            future.set_result(42);
        });
    });

    let future = job.exec();
    assert!(!future.is_finished());
    future.wait_for_finished().await;
    assert!(future.is_finished());
    assert_eq!(future.value(), Some(42));
}

#[tokio::test(start_paused = true)]
async fn async_then_runs_after_predecessor() {
    let reached = Arc::new(AtomicBool::new(false));
    let observed = reached.clone();

    let job = start(|future: Future<i32>| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            future.set_result(42);
        });
    })
    .then_async(move |v, future: Future<i32>| {
        observed.store(true, Ordering::SeqCst);
        future.set_result(v);
    });

    let future = job.exec();
    assert!(!reached.load(Ordering::SeqCst));
    future.wait_for_finished().await;
    assert!(reached.load(Ordering::SeqCst));
    assert_eq!(future.value(), Some(42));
}

#[tokio::test]
async fn nested_job_result_is_transparent() {
    let job = value(2).then_job(|v| value(v * 21));
    let future = job.exec();
    assert!(future.is_finished());
    assert_eq!(future.value(), Some(42));
}

#[tokio::test(start_paused = true)]
async fn nested_async_job_drives_the_outer_step() {
    let job = value(2).then_job(|v| wait(10).then(move |_| v * 21));
    let future = job.exec();
    assert!(!future.is_finished());
    future.wait_for_finished().await;
    assert_eq!(future.value(), Some(42));
}

#[tokio::test]
async fn exec_twice_yields_equal_results() {
    let job = value(5).then(|v| v + 1);
    let first = job.exec();
    let second = job.exec();
    assert_eq!(first.value(), second.value());
    assert_eq!(first.value(), Some(6));
}

#[tokio::test]
async fn jobs_branch_from_a_shared_prefix() {
    let base = value(10).then(|v| v + 1);
    let doubled = base.then(|v| v * 2);
    let squared = base.then(|v| v * v);
    assert_eq!(doubled.exec().value(), Some(22));
    assert_eq!(squared.exec().value(), Some(121));
}

#[tokio::test]
async fn concurrent_exec_with_keeps_initial_values_apart() {
    let job = start_with(|v: i32, future: Future<i32>| future.set_result(v * 2));
    let first = job.exec_with(1);
    let second = job.exec_with(2);
    assert_eq!(first.value(), Some(2));
    assert_eq!(second.value(), Some(4));
}

#[tokio::test]
async fn chain_sequences_a_prebuilt_job() {
    let consumer = for_each::<Vec<i32>, i32, i32>(start_with(|v: i32, future: Future<i32>| {
        future.set_result(v * 2)
    }));
    let job = value(vec![1, 2]).chain(&consumer);
    assert_eq!(job.exec().value(), Some(vec![2, 4]));
}

#[tokio::test]
async fn reduce_folds_a_container_synchronously() {
    let job = value(vec![1, 2, 3, 4]).reduce(|list: Vec<i32>| list.iter().sum::<i32>());
    let future = job.exec();
    assert!(future.is_finished());
    assert_eq!(future.value(), Some(10));
}

#[tokio::test(start_paused = true)]
async fn reduce_async_folds_through_a_callback() {
    let job = start(|future: Future<Vec<i32>>| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            future.set_result(vec![1, 2, 3, 4]);
        });
    })
    .reduce_async(|list: Vec<i32>, future: Future<i32>| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            future.set_result(list.iter().sum());
        });
    });

    let future = job.exec();
    future.wait_for_finished().await;
    assert_eq!(future.value(), Some(10));
}

#[tokio::test(start_paused = true)]
async fn progress_reports_reach_watchers_of_the_tail_future() {
    use std::sync::Mutex;

    let job = start(|future: Future<()>| {
        tokio::spawn(async move {
            for step in 1..=2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                future.set_progress_steps(step, 2);
            }
            future.set_finished();
        });
    });

    let future = job.exec();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let watcher = kasync::FutureWatcher::new().on_progress(move |fraction| {
        sink.lock().unwrap().push(fraction);
    });
    watcher.watch(&future);

    future.wait_for_finished().await;
    assert_eq!(*seen.lock().unwrap(), vec![0.5, 1.0]);
}
