// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Mailbox
//!
//! Unbounded FIFO of pending operations for one actor, drained by a single run loop. Unlike a
//! channel, the queue can be emptied from outside the consumer, which is what
//! `clear_pending_messages` and `close` need.
//!

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Notify;

use std::{collections::VecDeque, sync::Arc};

/// Type-erased queued operation. It resolves its own result handle.
pub(crate) type Operation<T> =
    Box<dyn FnOnce(Arc<T>) -> BoxFuture<'static, ()> + Send + 'static>;

/// One queued item.
pub(crate) struct Envelope<T> {
    operation: Operation<T>,
    relay: bool,
}

impl<T> Envelope<T> {
    /// An operation that runs against the target on the run loop.
    pub(crate) fn operation(operation: Operation<T>) -> Self {
        Self {
            operation,
            relay: false,
        }
    }

    /// A placeholder that waits for a worker pool job and resolves its handle in mailbox order.
    pub(crate) fn relay(operation: Operation<T>) -> Self {
        Self {
            operation,
            relay: true,
        }
    }

    pub(crate) fn is_relay(&self) -> bool {
        self.relay
    }

    pub(crate) async fn run(self, target: Arc<T>) {
        (self.operation)(target).await
    }
}

struct MailboxState<T> {
    queue: VecDeque<Envelope<T>>,
    closed: bool,
}

/// Single-consumer FIFO mailbox.
pub(crate) struct Mailbox<T> {
    state: Mutex<MailboxState<T>>,
    notify: Notify,
}

impl<T> Mailbox<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MailboxState {
                queue: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Appends an envelope. A closed mailbox hands it back.
    pub(crate) fn push(&self, envelope: Envelope<T>) -> Result<(), Envelope<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(envelope);
        }
        state.queue.push_back(envelope);
        drop(state);
        self.notify.notify_one();
        Ok(())
    }

    /// Waits for the next envelope.
    pub(crate) async fn recv(&self) -> Envelope<T> {
        loop {
            let next = self.state.lock().queue.pop_front();
            if let Some(envelope) = next {
                return envelope;
            }
            self.notify.notified().await;
        }
    }

    /// Removes every queued operation. Relays keep their place: each one resolves from its pool
    /// job, which either finishes or is withdrawn from the pool.
    pub(crate) fn clear(&self) -> Vec<Envelope<T>> {
        let mut state = self.state.lock();
        let (relays, cleared): (VecDeque<_>, VecDeque<_>) =
            state.queue.drain(..).partition(Envelope::is_relay);
        state.queue = relays;
        cleared.into()
    }

    /// Rejects further pushes and returns whatever was still queued.
    pub(crate) fn close(&self) -> Vec<Envelope<T>> {
        let mut state = self.state.lock();
        state.closed = true;
        state.queue.drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().queue.len()
    }
}
