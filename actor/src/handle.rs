// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Result handles
//!
//! Every send primitive returns a [`ResultHandle`]. The execution context that runs the operation
//! (the actor's run loop, a bypass task, or a relay waiting on a worker pool) owns the matching
//! [`Completer`] and resolves it exactly once. A completer dropped without resolving, as happens
//! when a queued operation is cleared or the actor closes, resolves the handle with
//! [`Error::Discarded`].
//!

use crate::Error;

use futures::FutureExt;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, error};

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    task::{Context, Poll},
};

/// Eventual outcome of one operation sent to an actor.
#[must_use = "a result handle does nothing unless awaited or waited on"]
#[derive(Debug)]
pub struct ResultHandle<R> {
    receiver: oneshot::Receiver<Result<R, Error>>,
}

/// Producer side of a [`ResultHandle`].
pub(crate) struct Completer<R> {
    sender: oneshot::Sender<Result<R, Error>>,
}

impl<R> ResultHandle<R> {
    /// Creates a connected completer and handle.
    pub(crate) fn channel() -> (Completer<R>, ResultHandle<R>) {
        let (sender, receiver) = oneshot::channel();
        (Completer { sender }, ResultHandle { receiver })
    }

    /// A handle already resolved with `error`.
    pub fn failed(error: Error) -> Self {
        let (completer, handle) = Self::channel();
        completer.complete(Err(error));
        handle
    }

    /// Blocks the current thread until the operation resolves.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context; await the handle there.
    pub fn wait(self) -> Result<R, Error> {
        self.receiver.blocking_recv().unwrap_or(Err(Error::Discarded))
    }

    /// Takes the outcome if it is already available.
    pub fn try_take(&mut self) -> Option<Result<R, Error>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(Error::Discarded)),
        }
    }
}

impl<R> Future for ResultHandle<R> {
    type Output = Result<R, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(Error::Discarded)))
    }
}

impl<R> Completer<R> {
    pub(crate) fn complete(self, outcome: Result<R, Error>) {
        if self.sender.send(outcome).is_err() {
            debug!("Result handle dropped before the operation finished.");
        }
    }
}

/// Drives `future` to completion, turning a panic into [`Error::Panicked`].
pub(crate) async fn guarded<F, R>(actor: &str, future: F) -> Result<R, Error>
where
    F: Future<Output = R>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|payload| {
        let message = workpool::panic_message(payload.as_ref());
        error!("Operation on actor {} panicked: {}", actor, message);
        Error::Panicked(message)
    })
}
