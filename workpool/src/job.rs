// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Jobs module.
//!
//! A job is a boxed closure queued in a worker pool. Jobs submitted on behalf of an owner carry an
//! [`OwnerTicket`] inside their body; the ticket keeps the job's id in the owner index while the
//! job is queued or running. A job that runs releases it before its outcome reaches the handle, a
//! job that is dropped unrun releases it on drop.
//!

use crate::error::{Error, panic_message};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error};

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// Identifier of a queued job, unique within one pool.
pub(crate) type JobId = u64;

/// Type-erased job body.
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// A job sitting in (or taken from) the pool queue.
pub(crate) struct Job {
    id: JobId,
    task: Task,
}

impl Job {
    pub(crate) fn new(id: JobId, task: Task) -> Self {
        Self { id, task }
    }

    pub(crate) fn id(&self) -> JobId {
        self.id
    }

    /// Runs the job on the current thread.
    pub(crate) fn run(self) {
        (self.task)();
    }
}

/// Index of outstanding job ids per owner.
#[derive(Default)]
pub(crate) struct OwnerIndex {
    owners: Mutex<HashMap<String, HashSet<JobId>>>,
}

impl OwnerIndex {
    /// Records `id` for `owner` and returns the ticket that releases it.
    pub(crate) fn register(self: &Arc<Self>, owner: &str, id: JobId) -> OwnerTicket {
        self.owners
            .lock()
            .entry(owner.to_owned())
            .or_default()
            .insert(id);
        OwnerTicket {
            index: Arc::clone(self),
            owner: owner.to_owned(),
            id,
        }
    }

    fn release(&self, owner: &str, id: JobId) {
        let mut owners = self.owners.lock();
        if let Some(ids) = owners.get_mut(owner) {
            ids.remove(&id);
            if ids.is_empty() {
                owners.remove(owner);
            }
        }
    }

    /// Removes and returns every id recorded for `owner`.
    pub(crate) fn take(&self, owner: &str) -> HashSet<JobId> {
        self.owners.lock().remove(owner).unwrap_or_default()
    }

    /// Copy of the ids recorded for `owner`.
    pub(crate) fn snapshot(&self, owner: &str) -> HashSet<JobId> {
        self.owners.lock().get(owner).cloned().unwrap_or_default()
    }

    pub(crate) fn count(&self, owner: &str) -> usize {
        self.owners.lock().get(owner).map_or(0, HashSet::len)
    }

    #[cfg(test)]
    pub(crate) fn contains_owner(&self, owner: &str) -> bool {
        self.owners.lock().contains_key(owner)
    }
}

/// Bookkeeping entry of one owned job. Dropping it removes the job from the owner index.
pub(crate) struct OwnerTicket {
    index: Arc<OwnerIndex>,
    owner: String,
    id: JobId,
}

impl Drop for OwnerTicket {
    fn drop(&mut self) {
        self.index.release(&self.owner, self.id);
    }
}

/// Wraps `task` so that its outcome, or its panic, is sent to the returned handle.
///
/// The owner ticket, if any, is released once `task` returns and before the outcome is sent, so a
/// caller that sees the handle resolve never finds the job in its owner's bookkeeping.
pub(crate) fn package<F, R>(task: F, ticket: Option<OwnerTicket>) -> (Task, JobHandle<R>)
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let task: Task = Box::new(move || {
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(task)).map_err(|payload| {
                let message = panic_message(payload.as_ref());
                error!("Job panicked: {}", message);
                Error::Panicked(message)
            });
        drop(ticket);
        if sender.send(outcome).is_err() {
            debug!("Job handle dropped before the job finished.");
        }
    });
    (task, JobHandle { receiver })
}

/// Handle to the eventual outcome of a submitted job.
///
/// Await it from async code or call [`JobHandle::wait`] from a plain thread. A job removed from
/// the queue before it ran resolves with [`Error::Cancelled`].
pub struct JobHandle<R> {
    receiver: oneshot::Receiver<Result<R, Error>>,
}

impl<R> JobHandle<R> {
    /// A handle that is already resolved with `error`.
    pub(crate) fn failed(error: Error) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(Err(error));
        Self { receiver }
    }

    /// Blocks the current thread until the job resolves.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context; await the handle there.
    pub fn wait(self) -> Result<R, Error> {
        self.receiver.blocking_recv().unwrap_or(Err(Error::Cancelled))
    }
}

impl<R> Future for JobHandle<R> {
    type Output = Result<R, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(Error::Cancelled)))
    }
}
