// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Cancellable worker pool
//!
//! A fixed set of OS threads consuming a double-ended job queue. Jobs may be tagged with an owner
//! name; the pool keeps an index from owner to outstanding job ids so that one owner can withdraw
//! its queued jobs without touching anybody else's. Urgent submissions go to the head of the queue.
//!
//! Cancellation only ever removes jobs that are still queued. A job taken by a worker runs to
//! completion.
//!

use crate::{
    error::Error,
    job::{Job, JobHandle, OwnerIndex, package},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Name of the pool, used as worker thread name prefix.
    pub name: String,
    /// Number of worker threads.
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "workpool".to_owned(),
            workers: num_cpus::get(),
        }
    }
}

impl PoolConfig {
    pub fn new(name: &str, workers: usize) -> Self {
        Self {
            name: name.to_owned(),
            workers,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

struct Queue {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

struct Shared {
    name: String,
    workers: usize,
    queue: Mutex<Queue>,
    available: Condvar,
    owners: Arc<OwnerIndex>,
    live: Mutex<usize>,
    finished: Condvar,
    next_id: AtomicU64,
}

/// Shared pool of worker threads with per-owner cancellation.
///
/// `WorkerPool` is a cheap handle: clones refer to the same workers and queue. Workers keep
/// running until [`WorkerPool::shutdown`] or [`WorkerPool::shutdown_now`] is called.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Creates a pool with `workers` threads and the default name.
    pub fn new(workers: usize) -> Result<Self, Error> {
        Self::with_config(PoolConfig::default().with_workers(workers))
    }

    /// Creates a pool from its configuration and starts every worker.
    pub fn with_config(config: PoolConfig) -> Result<Self, Error> {
        if config.workers == 0 {
            return Err(Error::InvalidSize);
        }
        let shared = Arc::new(Shared {
            name: config.name,
            workers: config.workers,
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
            owners: Arc::new(OwnerIndex::default()),
            live: Mutex::new(0),
            finished: Condvar::new(),
            next_id: AtomicU64::new(0),
        });

        for index in 0..shared.workers {
            *shared.live.lock() += 1;
            let worker = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", shared.name, index))
                .spawn(move || work(worker, index));
            if let Err(error) = spawned {
                *shared.live.lock() -= 1;
                let pool = WorkerPool { shared };
                pool.shutdown();
                return Err(Error::Spawn(error.to_string()));
            }
        }
        debug!(
            "Worker pool {} started with {} workers.",
            shared.name, shared.workers
        );
        Ok(WorkerPool { shared })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn worker_count(&self) -> usize {
        self.shared.workers
    }

    /// Number of jobs waiting in the queue, all owners included.
    pub fn queued_len(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// True if both handles point to the same pool.
    pub fn ptr_eq(&self, other: &WorkerPool) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Submits a job that belongs to no owner.
    pub fn submit<F, R>(&self, task: F) -> JobHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.enqueue(None, false, task)
    }

    /// Submits a job for `owner` at the tail of the queue.
    pub fn submit_for_actor<F, R>(&self, owner: &str, task: F) -> JobHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.enqueue(Some(owner), false, task)
    }

    /// Submits a job for `owner` at the head of the queue, ahead of every job not yet started.
    pub fn submit_urgent_for_actor<F, R>(&self, owner: &str, task: F) -> JobHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.enqueue(Some(owner), true, task)
    }

    fn enqueue<F, R>(&self, owner: Option<&str>, urgent: bool, task: F) -> JobHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        // The ticket exists before any worker can see the job.
        let ticket = owner.map(|owner| self.shared.owners.register(owner, id));
        let (task, handle) = package(task, ticket);
        let job = Job::new(id, task);

        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            drop(queue);
            drop(job);
            debug!("Rejected job submitted to stopped pool {}.", self.shared.name);
            return JobHandle::failed(Error::Shutdown(self.shared.name.clone()));
        }
        if urgent {
            queue.jobs.push_front(job);
        } else {
            queue.jobs.push_back(job);
        }
        drop(queue);
        self.shared.available.notify_one();
        handle
    }

    /// Removes every queued job of `owner` and clears its bookkeeping.
    ///
    /// Returns the number of jobs actually removed. Jobs already running are not counted and keep
    /// running; their handles resolve normally.
    pub fn cancel_jobs_for_actor(&self, owner: &str) -> usize {
        let ids = self.shared.owners.take(owner);
        if ids.is_empty() {
            return 0;
        }
        let removed = {
            let mut queue = self.shared.queue.lock();
            let mut removed = Vec::with_capacity(ids.len());
            let mut position = 0;
            // Stops as soon as every recorded id has been found in the queue.
            while position < queue.jobs.len() && removed.len() < ids.len() {
                if ids.contains(&queue.jobs[position].id()) {
                    if let Some(job) = queue.jobs.remove(position) {
                        removed.push(job);
                    }
                } else {
                    position += 1;
                }
            }
            removed
        };
        let count = removed.len();
        // Dropping outside the lock resolves the removed handles as cancelled.
        drop(removed);
        debug!(
            "Cancelled {} of {} outstanding jobs for {} in pool {}.",
            count,
            ids.len(),
            owner,
            self.shared.name
        );
        count
    }

    /// Number of jobs of `owner` still waiting in the queue.
    pub fn pending_job_count_for_actor(&self, owner: &str) -> usize {
        let ids = self.shared.owners.snapshot(owner);
        if ids.is_empty() {
            return 0;
        }
        let queue = self.shared.queue.lock();
        queue.jobs.iter().filter(|job| ids.contains(&job.id())).count()
    }

    /// Number of jobs of `owner` that are queued or running.
    pub fn outstanding_job_count_for_actor(&self, owner: &str) -> usize {
        self.shared.owners.count(owner)
    }

    /// Stops accepting jobs. Workers drain the queue and exit.
    pub fn shutdown(&self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.available.notify_all();
        debug!("Worker pool {} is shutting down.", self.shared.name);
    }

    /// Stops accepting jobs and discards the queue. Returns the number of discarded jobs.
    pub fn shutdown_now(&self) -> usize {
        let discarded = {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            std::mem::take(&mut queue.jobs)
        };
        self.shared.available.notify_all();
        let count = discarded.len();
        drop(discarded);
        if count > 0 {
            warn!(
                "Worker pool {} discarded {} queued jobs.",
                self.shared.name, count
            );
        }
        count
    }

    /// Waits up to `timeout` for every worker to exit. Returns true if they did.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let mut live = self.shared.live.lock();
        if *live > 0 {
            let _ = self
                .shared
                .finished
                .wait_while_for(&mut live, |live| *live > 0, timeout);
        }
        *live == 0
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.queue.lock().shutdown
    }

    /// True once the pool is shut down and every worker has exited.
    pub fn is_terminated(&self) -> bool {
        *self.shared.live.lock() == 0
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("workers", &self.shared.workers)
            .finish()
    }
}

/// Worker loop: take the next job, run it, repeat until shut down with an empty queue.
fn work(shared: Arc<Shared>, index: usize) {
    debug!("Worker {} of pool {} started.", index, shared.name);
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break Some(job);
                }
                if queue.shutdown {
                    break None;
                }
                shared.available.wait(&mut queue);
            }
        };
        match job {
            Some(job) => job.run(),
            None => break,
        }
    }
    let mut live = shared.live.lock();
    *live -= 1;
    shared.finished.notify_all();
    debug!("Worker {} of pool {} stopped.", index, shared.name);
}

#[cfg(test)]
mod tests {

    use super::*;

    use std::sync::{
        atomic::AtomicUsize,
        mpsc,
    };

    use tracing_test::traced_test;

    /// Occupies the single worker of `pool` until the returned sender is used or dropped.
    fn block_worker(pool: &WorkerPool) -> mpsc::Sender<()> {
        let (release, wait) = mpsc::channel::<()>();
        let (started, is_started) = mpsc::channel::<()>();
        let _ = pool.submit(move || {
            let _ = started.send(());
            let _ = wait.recv();
        });
        is_started.recv().unwrap();
        release
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert_eq!(WorkerPool::new(0).unwrap_err(), Error::InvalidSize);
    }

    #[test]
    fn test_config_builder() {
        let config = PoolConfig::default().with_name("compute").with_workers(3);
        assert_eq!(config, PoolConfig::new("compute", 3));
        let pool = WorkerPool::with_config(config).unwrap();
        assert_eq!(pool.name(), "compute");
        assert_eq!(pool.worker_count(), 3);
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
    }

    #[test]
    fn test_submit_returns_value() {
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.submit(|| 6 * 7);
        assert_eq!(handle.wait(), Ok(42));
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert!(pool.is_terminated());
    }

    #[test]
    fn test_urgent_jumps_queue() {
        let pool = WorkerPool::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let release = block_worker(&pool);

        let mut handles = Vec::new();
        for name in ["first", "second"] {
            let order = Arc::clone(&order);
            handles.push(pool.submit_for_actor("owner", move || order.lock().push(name)));
        }
        let urgent = Arc::clone(&order);
        handles.push(
            pool.submit_urgent_for_actor("owner", move || urgent.lock().push("urgent")),
        );
        assert_eq!(pool.pending_job_count_for_actor("owner"), 3);

        release.send(()).unwrap();
        for handle in handles {
            handle.wait().unwrap();
        }
        assert_eq!(*order.lock(), vec!["urgent", "first", "second"]);
        pool.shutdown();
    }

    #[test]
    #[traced_test]
    fn test_cancel_is_isolated_per_owner() {
        let pool = WorkerPool::new(1).unwrap();
        let release = block_worker(&pool);

        let alpha: Vec<_> = (0..3)
            .map(|i| pool.submit_for_actor("alpha", move || i))
            .collect();
        let beta: Vec<_> = (0..2)
            .map(|i| pool.submit_for_actor("beta", move || i * 10))
            .collect();

        assert_eq!(pool.cancel_jobs_for_actor("alpha"), 3);
        assert_eq!(pool.pending_job_count_for_actor("alpha"), 0);
        assert_eq!(pool.outstanding_job_count_for_actor("alpha"), 0);
        assert_eq!(pool.pending_job_count_for_actor("beta"), 2);
        assert!(logs_contain("Cancelled 3 of 3 outstanding jobs for alpha"));

        release.send(()).unwrap();
        for handle in alpha {
            assert_eq!(handle.wait(), Err(Error::Cancelled));
        }
        let values: Vec<_> = beta.into_iter().map(|h| h.wait().unwrap()).collect();
        assert_eq!(values, vec![0, 10]);
        pool.shutdown();
    }

    #[test]
    fn test_cancel_unknown_owner() {
        let pool = WorkerPool::new(1).unwrap();
        assert_eq!(pool.cancel_jobs_for_actor("nobody"), 0);
        assert_eq!(pool.pending_job_count_for_actor("nobody"), 0);
        pool.shutdown();
    }

    #[test]
    fn test_bookkeeping_cleared_after_completion() {
        let pool = WorkerPool::new(2).unwrap();
        for round in 0..5_000 {
            pool.submit_for_actor("gamma", || ()).wait().unwrap();
            assert_eq!(
                pool.outstanding_job_count_for_actor("gamma"),
                0,
                "bookkeeping left behind in round {}",
                round
            );
        }
        let failing = pool.submit_for_actor("gamma", || -> u8 { panic!("bad job") });
        assert!(matches!(failing.wait(), Err(Error::Panicked(_))));
        assert_eq!(pool.outstanding_job_count_for_actor("gamma"), 0);
        pool.shutdown();
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let failing = pool.submit(|| -> u8 { panic!("first job fails") });
        assert_eq!(
            failing.wait(),
            Err(Error::Panicked("first job fails".to_owned()))
        );
        assert_eq!(pool.submit(|| 5).wait(), Ok(5));
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::with_config(PoolConfig::new("closed", 1)).unwrap();
        pool.shutdown();
        assert!(pool.is_shutdown());
        let handle = pool.submit_for_actor("late", || 1);
        assert_eq!(handle.wait(), Err(Error::Shutdown("closed".to_owned())));
        assert_eq!(pool.outstanding_job_count_for_actor("late"), 0);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let pool = WorkerPool::new(1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let done = Arc::clone(&done);
                pool.submit(move || {
                    done.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert_eq!(done.load(Ordering::SeqCst), 5);
        for handle in handles {
            assert!(handle.wait().is_ok());
        }
    }

    #[test]
    fn test_shutdown_now_discards_queue() {
        let pool = WorkerPool::new(1).unwrap();
        let release = block_worker(&pool);
        let handles: Vec<_> = (0..4).map(|i| pool.submit(move || i)).collect();
        assert_eq!(pool.shutdown_now(), 4);
        assert_eq!(pool.queued_len(), 0);
        release.send(()).unwrap();
        assert!(pool.await_termination(Duration::from_secs(5)));
        for handle in handles {
            assert_eq!(handle.wait(), Err(Error::Cancelled));
        }
    }

    #[test]
    fn test_await_termination_times_out() {
        let pool = WorkerPool::new(1).unwrap();
        let release = block_worker(&pool);
        pool.shutdown();
        assert!(!pool.await_termination(Duration::from_millis(50)));
        assert!(!pool.is_terminated());
        release.send(()).unwrap();
        assert!(pool.await_termination(Duration::from_secs(5)));
    }

    #[test]
    fn test_ptr_eq() {
        let pool = WorkerPool::new(1).unwrap();
        let other = WorkerPool::new(1).unwrap();
        assert!(pool.ptr_eq(&pool.clone()));
        assert!(!pool.ptr_eq(&other));
        pool.shutdown();
        other.shutdown();
    }
}
