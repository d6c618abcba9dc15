// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Cancellation behaviour of the worker pool under real concurrency.

use workpool::{Error, PoolConfig, WorkerPool};

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// Running jobs survive a cancellation and keep their started count.
#[test]
fn test_cancel_excludes_running_jobs() {
    let pool = WorkerPool::with_config(PoolConfig::new("running", 2)).unwrap();
    let started = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let started = Arc::clone(&started);
            let completed = Arc::clone(&completed);
            pool.submit_for_actor("slow", move || {
                started.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(200));
                completed.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    assert!(wait_until(Duration::from_secs(5), || started.load(Ordering::SeqCst) >= 2));
    let started_at_cancel = started.load(Ordering::SeqCst);
    let cancelled = pool.cancel_jobs_for_actor("slow");
    assert!(cancelled > 0);

    let mut ok = 0;
    let mut cancelled_handles = 0;
    for handle in handles {
        match handle.wait() {
            Ok(()) => ok += 1,
            Err(Error::Cancelled) => cancelled_handles += 1,
            Err(error) => panic!("unexpected error: {error}"),
        }
    }

    assert_eq!(cancelled_handles, cancelled);
    assert_eq!(ok + cancelled, 10);
    assert!(ok >= started_at_cancel);
    assert!(started.load(Ordering::SeqCst) >= started_at_cancel);
    assert_eq!(completed.load(Ordering::SeqCst), ok);
    assert_eq!(pool.outstanding_job_count_for_actor("slow"), 0);
    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(5)));
}

// Two owners share a pool; cancelling one leaves the other's work intact.
#[test]
fn test_cancel_isolated_between_owners() {
    let pool = WorkerPool::with_config(PoolConfig::new("shared", 2)).unwrap();
    let first_done = Arc::new(AtomicUsize::new(0));
    let second_done = Arc::new(AtomicUsize::new(0));

    let mut first = Vec::new();
    let mut second = Vec::new();
    for _ in 0..20 {
        let done = Arc::clone(&first_done);
        first.push(pool.submit_for_actor("first", move || {
            thread::sleep(Duration::from_millis(20));
            done.fetch_add(1, Ordering::SeqCst);
        }));
        let done = Arc::clone(&second_done);
        second.push(pool.submit_for_actor("second", move || {
            thread::sleep(Duration::from_millis(20));
            done.fetch_add(1, Ordering::SeqCst);
        }));
    }

    let cancelled = pool.cancel_jobs_for_actor("first");
    assert!(cancelled > 0);
    assert_eq!(pool.pending_job_count_for_actor("first"), 0);

    for handle in second {
        assert_eq!(handle.wait(), Ok(()));
    }
    assert_eq!(second_done.load(Ordering::SeqCst), 20);
    for handle in first {
        let _ = handle.wait();
    }
    assert_eq!(first_done.load(Ordering::SeqCst) + cancelled, 20);
    pool.shutdown();
}

// Handles can be awaited from async code while workers run on OS threads.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handles_are_futures() {
    let pool = WorkerPool::new(4).unwrap();
    let handles: Vec<_> = (0..8u64)
        .map(|i| pool.submit_for_actor("async", move || i * i))
        .collect();
    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, 140);
    pool.shutdown();
}
