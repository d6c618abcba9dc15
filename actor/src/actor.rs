// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor
//!
//! An [`ActorRef`] wraps one target value behind a FIFO mailbox drained by a dedicated run loop.
//!
//! ## Access paths
//!
//! | Path | Methods | Ordering | Runs on |
//! |------|---------|----------|---------|
//! | ordered | [`tell`](ActorRef::tell), [`ask`](ActorRef::ask), [`try_ask`](ActorRef::try_ask) | submission order, never overlapping | the actor's run loop |
//! | bypass | [`tell_now`](ActorRef::tell_now), [`ask_now`](ActorRef::ask_now) | none | a fresh task per call |
//! | offload | [`tell_on`](ActorRef::tell_on), [`ask_on`](ActorRef::ask_on) and urgent variants | results resolve in submission order | a [`WorkerPool`] thread |
//!
//! The target is shared as `Arc<T>` and every path gets a shared reference to it. Bypass and
//! offloaded operations run while ordered operations may be running too, so the target type must
//! be `Sync` and must carry its own interior mutability (a `Mutex`, atomics, ...) for whatever it
//! mutates. The ordered path adds one guarantee on top: two ordered operations never run at the
//! same time, and they run in the order they were sent.
//!

use crate::{
    ActorConfig, Error, Invocable, InvokeResult,
    handle::{ResultHandle, guarded},
    mailbox::{Envelope, Mailbox},
    runner::{ActorRunner, TargetSlot},
    system::{SystemInner, SystemRef},
};

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::{runtime::Handle, select, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use workpool::WorkerPool;

use std::{
    collections::BTreeSet,
    fmt::{self, Display},
    future::Future,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(0);

/// Where an actor is registered.
pub(crate) struct Registration {
    pub(crate) system: Weak<SystemInner>,
    pub(crate) key: String,
}

/// State shared by every clone of an [`ActorRef`].
struct ActorCell<T> {
    name: String,
    owner: String,
    config: ActorConfig,
    runtime: Handle,
    target: TargetSlot<T>,
    mailbox: Arc<Mailbox<T>>,
    token: CancellationToken,
    closed: AtomicBool,
    runner: Mutex<Option<JoinHandle<()>>>,
    pools: Mutex<Vec<WorkerPool>>,
    parent: Mutex<Option<String>>,
    children: Mutex<BTreeSet<String>>,
    registration: Mutex<Option<Registration>>,
}

impl<T> Drop for ActorCell<T> {
    fn drop(&mut self) {
        // Last reference gone: let the run loop exit.
        self.token.cancel();
    }
}

/// Reference to a running actor.
///
/// Cloning is cheap; every clone addresses the same mailbox and target. The actor keeps running
/// until [`ActorRef::close`] is called or the last reference is dropped.
pub struct ActorRef<T>
where
    T: Send + Sync + 'static,
{
    cell: Arc<ActorCell<T>>,
}

impl<T> Clone for ActorRef<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for ActorRef<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("name", &self.cell.name)
            .field("closed", &self.cell.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl<T> ActorRef<T>
where
    T: Send + Sync + 'static,
{
    /// Creates an actor with the default configuration and starts its run loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when called outside a tokio runtime.
    pub fn new(name: &str, target: T) -> Result<Self, Error> {
        Self::with_config(name, target, ActorConfig::default())
    }

    /// Creates an actor and starts its run loop on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when called outside a tokio runtime.
    pub fn with_config(
        name: &str,
        target: T,
        config: ActorConfig,
    ) -> Result<Self, Error> {
        let runtime =
            Handle::try_current().map_err(|error| Error::Runtime(error.to_string()))?;
        let mailbox = Arc::new(Mailbox::new());
        let target: TargetSlot<T> = Arc::new(RwLock::new(Some(Arc::new(target))));
        let token = CancellationToken::new();

        let runner = ActorRunner::new(
            name,
            Arc::clone(&mailbox),
            Arc::clone(&target),
            token.clone(),
        );
        let join = runtime.spawn(runner.run());
        let owner = format!("{}#{}", name, NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed));
        debug!("Actor {} created as pool owner {}.", name, owner);

        Ok(Self {
            cell: Arc::new(ActorCell {
                name: name.to_owned(),
                owner,
                config,
                runtime,
                target,
                mailbox,
                token,
                closed: AtomicBool::new(false),
                runner: Mutex::new(Some(join)),
                pools: Mutex::new(Vec::new()),
                parent: Mutex::new(None),
                children: Mutex::new(BTreeSet::new()),
                registration: Mutex::new(None),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// Owner tag of this actor's worker pool jobs. Unique per actor, even among actors that share
    /// a name.
    pub fn pool_owner(&self) -> &str {
        &self.cell.owner
    }

    /// Name of the actor that created this one through [`ActorRef::create_child`].
    pub fn parent(&self) -> Option<String> {
        self.cell.parent.lock().clone()
    }

    /// Names of the children created through [`ActorRef::create_child`].
    pub fn children(&self) -> Vec<String> {
        self.cell.children.lock().iter().cloned().collect()
    }

    /// Number of operations waiting in the mailbox.
    pub fn pending_messages(&self) -> usize {
        self.cell.mailbox.len()
    }

    /// The actor system this actor is registered in, if any.
    pub fn system(&self) -> Option<SystemRef> {
        self.cell
            .registration
            .lock()
            .as_ref()
            .and_then(|registration| registration.system.upgrade())
            .map(SystemRef::from_inner)
    }

    /// True while the actor is open, its run loop is alive and it still holds its target.
    pub fn is_alive(&self) -> bool {
        if self.cell.closed.load(Ordering::Acquire) {
            return false;
        }
        let running = self
            .cell
            .runner
            .lock()
            .as_ref()
            .is_some_and(|runner| !runner.is_finished());
        running && self.cell.target.read().is_some()
    }

    fn live_target(&self) -> Result<Arc<T>, Error> {
        if self.cell.closed.load(Ordering::Acquire) {
            return Err(Error::Closed(self.cell.name.clone()));
        }
        self.cell
            .target
            .read()
            .clone()
            .ok_or_else(|| Error::Closed(self.cell.name.clone()))
    }

    fn enqueue(&self, envelope: Envelope<T>) -> Result<(), Error> {
        if self.cell.closed.load(Ordering::Acquire) {
            return Err(Error::Closed(self.cell.name.clone()));
        }
        self.cell
            .mailbox
            .push(envelope)
            .map_err(|_| Error::Closed(self.cell.name.clone()))
    }

    /// Queues `run` on the run loop; `run` resolves the handle itself.
    fn enqueue_ordered<F, Fut, R>(&self, run: F) -> ResultHandle<R>
    where
        F: FnOnce(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: Send + 'static,
    {
        let (completer, handle) = ResultHandle::channel();
        let envelope = Envelope::operation(Box::new(move |target| {
            async move { completer.complete(run(target).await) }.boxed()
        }));
        match self.enqueue(envelope) {
            Ok(()) => handle,
            Err(error) => {
                debug!("Rejected operation: {}", error);
                ResultHandle::failed(error)
            }
        }
    }

    /// Queues a fire-and-forget operation.
    ///
    /// The handle resolves once the operation has run on the actor's run loop, after every
    /// operation queued before it.
    pub fn tell<F, Fut>(&self, op: F) -> ResultHandle<()>
    where
        F: FnOnce(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.ask(op)
    }

    /// Queues a request-reply operation. Same ordering as [`ActorRef::tell`].
    ///
    /// A panic inside `op` resolves the handle with [`Error::Panicked`]; the run loop carries on
    /// with the next operation.
    pub fn ask<F, Fut, R>(&self, op: F) -> ResultHandle<R>
    where
        F: FnOnce(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let name = self.cell.name.clone();
        self.enqueue_ordered(move |target| async move {
            guarded(&name, async move { op(target).await }).await
        })
    }

    /// Queues a fallible request-reply operation. An `Err` resolves the handle with
    /// [`Error::Operation`].
    pub fn try_ask<F, Fut, R, E>(&self, op: F) -> ResultHandle<R>
    where
        F: FnOnce(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Display + Send + 'static,
    {
        let name = self.cell.name.clone();
        self.enqueue_ordered(move |target| async move {
            match guarded(&name, async move { op(target).await }).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(Error::Operation(error.to_string())),
                Err(error) => Err(error),
            }
        })
    }

    /// Runs a fire-and-forget operation immediately, bypassing the mailbox.
    ///
    /// The operation runs concurrently with the mailbox and with other bypass calls and gives no
    /// ordering guarantee. Values it reads may be stale by the time the handle resolves.
    pub fn tell_now<F, Fut>(&self, op: F) -> ResultHandle<()>
    where
        F: FnOnce(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.ask_now(op)
    }

    /// Runs a request-reply operation immediately, bypassing the mailbox. See
    /// [`ActorRef::tell_now`].
    pub fn ask_now<F, Fut, R>(&self, op: F) -> ResultHandle<R>
    where
        F: FnOnce(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let target = match self.live_target() {
            Ok(target) => target,
            Err(error) => return ResultHandle::failed(error),
        };
        let (completer, handle) = ResultHandle::channel();
        let name = self.cell.name.clone();
        self.cell.runtime.spawn(async move {
            completer.complete(guarded(&name, async move { op(target).await }).await);
        });
        handle
    }

    /// Offloads a fire-and-forget operation to `pool`, tagged with [`ActorRef::pool_owner`].
    pub fn tell_on<F>(&self, pool: &WorkerPool, op: F) -> ResultHandle<()>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.offload(pool, false, op)
    }

    /// Offloads a request-reply operation to `pool`, tagged with [`ActorRef::pool_owner`].
    ///
    /// The operation runs on a pool thread as soon as one is free, but its handle resolves
    /// through the mailbox, in the order the operation was sent relative to other ordered
    /// operations of this actor.
    pub fn ask_on<F, R>(&self, pool: &WorkerPool, op: F) -> ResultHandle<R>
    where
        F: FnOnce(&T) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.offload(pool, false, op)
    }

    /// Like [`ActorRef::tell_on`], but the job goes to the head of the pool queue.
    pub fn tell_urgent_on<F>(&self, pool: &WorkerPool, op: F) -> ResultHandle<()>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.offload(pool, true, op)
    }

    /// Like [`ActorRef::ask_on`], but the job goes to the head of the pool queue.
    pub fn ask_urgent_on<F, R>(&self, pool: &WorkerPool, op: F) -> ResultHandle<R>
    where
        F: FnOnce(&T) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.offload(pool, true, op)
    }

    fn offload<F, R>(&self, pool: &WorkerPool, urgent: bool, op: F) -> ResultHandle<R>
    where
        F: FnOnce(&T) -> R + Send + 'static,
        R: Send + 'static,
    {
        let target = match self.live_target() {
            Ok(target) => target,
            Err(error) => return ResultHandle::failed(error),
        };
        self.remember_pool(pool);

        let task = move || op(target.as_ref());
        let job = if urgent {
            pool.submit_urgent_for_actor(&self.cell.owner, task)
        } else {
            pool.submit_for_actor(&self.cell.owner, task)
        };

        let (completer, handle) = ResultHandle::channel();
        let token = self.cell.token.clone();
        let name = self.cell.name.clone();
        let relay = Envelope::relay(Box::new(move |_target| {
            async move {
                // A running job can't be stopped, but close must not wait for it.
                let outcome = select! {
                    biased;
                    outcome = job => outcome.map_err(Error::from),
                    _ = token.cancelled() => Err(Error::Closed(name)),
                };
                completer.complete(outcome);
            }
            .boxed()
        }));
        match self.enqueue(relay) {
            Ok(()) => handle,
            Err(error) => ResultHandle::failed(error),
        }
    }

    fn remember_pool(&self, pool: &WorkerPool) {
        let mut pools = self.cell.pools.lock();
        if !pools.iter().any(|known| known.ptr_eq(pool)) {
            pools.push(pool.clone());
        }
    }

    /// Drops every queued operation and withdraws this actor's queued jobs from every pool it
    /// has used. Returns how many operations were removed.
    ///
    /// The operation currently running, if any, completes normally. Dropped operations resolve
    /// their handles with [`Error::Discarded`], withdrawn pool jobs with [`Error::Cancelled`].
    /// A pool job that had already started keeps its place in the mailbox and resolves with its
    /// own outcome. Each offloaded operation counts once, and only if its pool job had not started.
    pub fn clear_pending_messages(&self) -> usize {
        let queued = self.cell.mailbox.clear().len();

        let pools = self.cell.pools.lock().clone();
        let cancelled: usize = pools
            .iter()
            .map(|pool| pool.cancel_jobs_for_actor(&self.cell.owner))
            .sum();
        debug!(
            "Actor {} cleared {} queued operations and {} pool jobs.",
            &self.cell.name, queued, cancelled
        );
        queued + cancelled
    }

    /// Creates an actor in this actor's system and records it as a child.
    ///
    /// The relationship is bookkeeping only: the parent does not watch or restart the child.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Detached`] if this actor is not registered in a live actor system.
    pub async fn create_child<C>(&self, name: &str, target: C) -> Result<ActorRef<C>, Error>
    where
        C: Send + Sync + 'static,
    {
        let system = self
            .system()
            .ok_or_else(|| Error::Detached(self.cell.name.clone()))?;
        let child = system.create_actor(name, target).await?;
        *child.cell.parent.lock() = Some(self.cell.name.clone());
        self.cell.children.lock().insert(name.to_owned());
        Ok(child)
    }

    /// Closes the actor.
    ///
    /// Stops the run loop, discards queued operations, withdraws queued pool jobs, releases the
    /// target and removes the actor from its system. Waits at most
    /// [`ActorConfig::close_timeout`] for a running operation, then aborts the run loop. Calling
    /// it again is a no-op.
    pub async fn close(&self) {
        if self.cell.closed.swap(true, Ordering::AcqRel) {
            debug!("Actor {} is already closed.", &self.cell.name);
            return;
        }
        debug!("Closing actor {}.", &self.cell.name);
        self.cell.token.cancel();

        let discarded = self.cell.mailbox.close();
        if !discarded.is_empty() {
            debug!(
                "Actor {} discarded {} queued operations.",
                &self.cell.name,
                discarded.len()
            );
        }
        drop(discarded);
        let pools = self.cell.pools.lock().clone();
        for pool in pools {
            pool.cancel_jobs_for_actor(&self.cell.owner);
        }

        let runner = self.cell.runner.lock().take();
        if let Some(mut runner) = runner {
            // Closing from one of its own ordered operations: the loop exits when it returns.
            let own_loop = tokio::task::try_id().is_some_and(|id| id == runner.id());
            if !own_loop {
                match tokio::time::timeout(self.cell.config.close_timeout, &mut runner).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        warn!("Run loop of actor {} ended abnormally: {}", &self.cell.name, error);
                    }
                    Err(_) => {
                        warn!(
                            "Actor {} did not stop within {:?}, aborting its run loop.",
                            &self.cell.name, self.cell.config.close_timeout
                        );
                        runner.abort();
                    }
                }
            }
        }

        *self.cell.target.write() = None;
        self.detach().await;
        debug!("Actor {} closed.", &self.cell.name);
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.cell) as *const () as usize
    }

    pub(crate) fn attach_to(&self, registration: Registration) {
        *self.cell.registration.lock() = Some(registration);
    }

    async fn detach(&self) {
        let registration = self.cell.registration.lock().take();
        if let Some(registration) = registration {
            if let Some(system) = registration.system.upgrade() {
                SystemRef::from_inner(system)
                    .unregister(&registration.key, self.key())
                    .await;
            }
        }
    }
}

impl<T> ActorRef<T>
where
    T: Invocable,
{
    /// Queues a name-based invocation on the target.
    pub fn invoke(&self, action: &str, args: &str) -> ResultHandle<InvokeResult> {
        let action = action.to_owned();
        let args = args.to_owned();
        self.ask(move |target| async move {
            let outcome = target.invoke(&action, &args).await;
            InvokeResult::from(outcome)
        })
    }

    /// Runs a name-based invocation immediately, bypassing the mailbox.
    pub fn invoke_now(&self, action: &str, args: &str) -> ResultHandle<InvokeResult> {
        let action = action.to_owned();
        let args = args.to_owned();
        self.ask_now(move |target| async move {
            let outcome = target.invoke(&action, &args).await;
            InvokeResult::from(outcome)
        })
    }
}

/// Type-erased view of an actor used by the actor system.
#[async_trait]
pub(crate) trait Lifecycle: Send + Sync {
    /// Identity of the underlying actor, shared by all its clones.
    fn key(&self) -> usize;

    fn is_alive(&self) -> bool;

    async fn close(&self);
}

#[async_trait]
impl<T> Lifecycle for ActorRef<T>
where
    T: Send + Sync + 'static,
{
    fn key(&self) -> usize {
        ActorRef::key(self)
    }

    fn is_alive(&self) -> bool {
        ActorRef::is_alive(self)
    }

    async fn close(&self) {
        ActorRef::close(self).await
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use std::{
        sync::atomic::AtomicU64,
        time::{Duration, Instant},
    };

    use tracing_test::traced_test;

    #[derive(Default)]
    struct Counter {
        value: AtomicU64,
    }

    #[tokio::test]
    async fn test_tell_and_ask() {
        let actor = ActorRef::new("counter", Counter::default()).unwrap();
        for step in 1..=3 {
            let _ = actor.tell(move |counter: Arc<Counter>| async move {
                counter.value.fetch_add(step, Ordering::SeqCst);
            });
        }
        let value = actor
            .ask(|counter| async move { counter.value.load(Ordering::SeqCst) })
            .await
            .unwrap();
        assert_eq!(value, 6);
        actor.close().await;
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let outcome = ActorRef::new("orphan", Counter::default());
        assert!(matches!(outcome, Err(Error::Runtime(_))));
    }

    #[tokio::test]
    async fn test_try_ask_maps_errors() {
        let actor = ActorRef::new("fallible", Counter::default()).unwrap();
        let outcome = actor
            .try_ask(|_counter| async move { Err::<u64, _>("no quota left") })
            .await;
        assert_eq!(outcome, Err(Error::Operation("no quota left".to_owned())));
        let outcome = actor
            .try_ask(|counter| async move {
                Ok::<_, String>(counter.value.load(Ordering::SeqCst))
            })
            .await;
        assert_eq!(outcome, Ok(0));
        actor.close().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn test_panic_does_not_stop_loop() {
        let actor = ActorRef::new("fragile", Counter::default()).unwrap();
        let failed = actor.ask(|_counter| async move {
            if true {
                panic!("broken operation");
            }
            1_u8
        });
        let next = actor.ask(|counter| async move {
            counter.value.fetch_add(1, Ordering::SeqCst) + 1
        });
        assert_eq!(failed.await, Err(Error::Panicked("broken operation".to_owned())));
        assert_eq!(next.await, Ok(1));
        assert!(actor.is_alive());
        assert!(logs_contain("Operation on actor fragile panicked"));
        actor.close().await;
    }

    #[tokio::test]
    async fn test_sends_after_close_fail_fast() {
        let actor = ActorRef::new("closed", Counter::default()).unwrap();
        actor.close().await;
        let closed = Error::Closed("closed".to_owned());
        assert_eq!(actor.tell(|_c| async {}).await, Err(closed.clone()));
        assert_eq!(actor.ask(|_c| async { 1 }).await, Err(closed.clone()));
        assert_eq!(actor.tell_now(|_c| async {}).await, Err(closed.clone()));
        let pool = WorkerPool::new(1).unwrap();
        assert_eq!(actor.ask_on(&pool, |_c| 1).await, Err(closed));
        pool.shutdown();
    }

    #[tokio::test]
    #[traced_test]
    async fn test_close_is_idempotent() {
        let actor = ActorRef::new("twice", Counter::default()).unwrap();
        assert!(actor.is_alive());
        actor.close().await;
        assert!(!actor.is_alive());
        actor.close().await;
        assert!(!actor.is_alive());
        assert!(logs_contain("Actor twice is already closed."));
    }

    #[tokio::test]
    async fn test_close_discards_queue() {
        let actor = ActorRef::new("busy", Counter::default()).unwrap();
        let slow = actor.tell(|_c| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        });
        let queued = actor.ask(|c| async move { c.value.load(Ordering::SeqCst) });
        tokio::time::sleep(Duration::from_millis(20)).await;
        actor.close().await;
        assert_eq!(slow.await, Ok(()));
        assert_eq!(queued.await, Err(Error::Discarded));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_close_aborts_stuck_operation() {
        let config = ActorConfig::default().with_close_timeout(Duration::from_millis(100));
        let actor = ActorRef::with_config("stuck", Counter::default(), config).unwrap();
        let stuck = actor.tell(|_c| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let start = Instant::now();
        actor.close().await;
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!actor.is_alive());
        assert_eq!(stuck.await, Err(Error::Discarded));
        assert!(logs_contain("aborting its run loop"));
    }

    #[tokio::test]
    async fn test_close_from_own_operation() {
        let actor = ActorRef::new("self-closing", Counter::default()).unwrap();
        let this = actor.clone();
        let start = Instant::now();
        let closed = actor.ask(move |_c| async move {
            this.close().await;
            true
        });
        assert_eq!(closed.await, Ok(true));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!actor.is_alive());
    }

    #[tokio::test]
    async fn test_pending_messages() {
        let actor = ActorRef::new("pending", Counter::default()).unwrap();
        let _ = actor.tell(|_c| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let queued: Vec<_> = (0..3).map(|_| actor.tell(|_c| async {})).collect();
        assert_eq!(actor.pending_messages(), 3);
        assert_eq!(actor.clear_pending_messages(), 3);
        assert_eq!(actor.pending_messages(), 0);
        for handle in queued {
            assert_eq!(handle.await, Err(Error::Discarded));
        }
        actor.close().await;
    }

    #[tokio::test]
    async fn test_clear_keeps_running_offload_results() {
        let pool = WorkerPool::new(2).unwrap();
        let actor = ActorRef::new("crunching", Counter::default()).unwrap();
        let first = actor.ask_on(&pool, |_c| {
            std::thread::sleep(Duration::from_millis(300));
            1
        });
        let second = actor.ask_on(&pool, |_c| {
            std::thread::sleep(Duration::from_millis(300));
            2
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(actor.clear_pending_messages(), 0);
        assert_eq!(first.await, Ok(1));
        assert_eq!(second.await, Ok(2));
        actor.close().await;
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_pool_owner_is_unique_per_actor() {
        let pool = WorkerPool::new(1).unwrap();
        let old = ActorRef::new("twin", Counter::default()).unwrap();
        let new = ActorRef::new("twin", Counter::default()).unwrap();
        assert_ne!(old.pool_owner(), new.pool_owner());
        assert!(old.pool_owner().starts_with("twin#"));

        let (release, wait) = std::sync::mpsc::channel::<()>();
        let (started, is_started) = std::sync::mpsc::channel::<()>();
        let busy = old.tell_on(&pool, move |_c| {
            let _ = started.send(());
            let _ = wait.recv();
        });
        is_started.recv().unwrap();
        let queued = new.ask_on(&pool, |_c| 5);
        old.close().await;
        assert_eq!(pool.pending_job_count_for_actor(new.pool_owner()), 1);

        release.send(()).unwrap();
        assert_eq!(queued.await, Ok(5));
        assert!(busy.await.is_err());
        new.close().await;
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_dropping_last_reference_stops_loop() {
        let actor = ActorRef::new("dropped", Counter::default()).unwrap();
        let runner = actor.cell.runner.lock().take().unwrap();
        drop(actor);
        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .unwrap()
            .unwrap();
    }
}
