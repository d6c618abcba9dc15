// Copyright 2024 Antonio Estévez
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the actor system.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// The actor was closed before the operation was accepted.
    #[error("Actor {0} is closed.")]
    Closed(String),
    /// No live actor is registered under the name.
    #[error("Actor {0} not found.")]
    NotFound(String),
    /// The actor is not attached to an actor system.
    #[error("Actor {0} is not attached to an actor system.")]
    Detached(String),
    /// The operation panicked.
    #[error("Operation panicked: {0}")]
    Panicked(String),
    /// The operation returned an error.
    #[error("Operation failed: {0}")]
    Operation(String),
    /// The operation was dropped from the mailbox before it ran.
    #[error("Operation was discarded before it completed.")]
    Discarded,
    /// The operation was withdrawn from a worker pool before it started.
    #[error("Operation was cancelled.")]
    Cancelled,
    /// A worker pool refused the operation.
    #[error("Worker pool rejected the operation: {0}")]
    Rejected(String),
    /// No async runtime is available to run the actor.
    #[error("An error occurred while starting the actor runtime: {0}")]
    Runtime(String),
    /// The actor system was terminated.
    #[error("Actor system {0} is terminated.")]
    Terminated(String),
}

impl From<workpool::Error> for Error {
    fn from(error: workpool::Error) -> Self {
        match error {
            workpool::Error::Cancelled => Error::Cancelled,
            workpool::Error::Panicked(message) => Error::Panicked(message),
            other => Error::Rejected(other.to_string()),
        }
    }
}
