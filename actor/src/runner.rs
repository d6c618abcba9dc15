// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor runner
//!
//! The run loop owns nothing but shared handles: the mailbox, the target slot and the stop token.
//! It takes one envelope at a time and runs it to completion before taking the next, so ordered
//! operations never overlap.
//!

use crate::mailbox::Mailbox;

use parking_lot::RwLock;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use std::sync::Arc;

/// Slot holding the target while the actor is alive. `close` empties it.
pub(crate) type TargetSlot<T> = Arc<RwLock<Option<Arc<T>>>>;

pub(crate) struct ActorRunner<T> {
    name: String,
    mailbox: Arc<Mailbox<T>>,
    target: TargetSlot<T>,
    token: CancellationToken,
}

impl<T> ActorRunner<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(
        name: &str,
        mailbox: Arc<Mailbox<T>>,
        target: TargetSlot<T>,
        token: CancellationToken,
    ) -> Self {
        debug!("Creating new actor runner.");
        Self {
            name: name.to_owned(),
            mailbox,
            target,
            token,
        }
    }

    /// Main loop of the actor.
    pub(crate) async fn run(self) {
        debug!("Running actor {}.", &self.name);
        loop {
            let envelope = select! {
                biased;
                _ = self.token.cancelled() => break,
                envelope = self.mailbox.recv() => envelope,
            };
            let target = self.target.read().clone();
            let Some(target) = target else {
                break;
            };
            envelope.run(target).await;
        }
        debug!("Actor {} run loop stopped.", &self.name);
    }
}
