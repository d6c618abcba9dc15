// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!

use thiserror::Error;

use std::any::Any;

/// Error type for the worker pool.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The job was removed from the queue before a worker took it.
    #[error("Job was cancelled before it started.")]
    Cancelled,
    /// The job panicked while running on a worker.
    #[error("Job panicked: {0}")]
    Panicked(String),
    /// The pool no longer accepts jobs.
    #[error("Worker pool {0} is shut down.")]
    Shutdown(String),
    /// A worker thread could not be spawned.
    #[error("Can't spawn worker thread: {0}")]
    Spawn(String),
    /// A pool was requested with zero workers.
    #[error("A worker pool needs at least one worker.")]
    InvalidSize,
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
