// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Name-based invocation
//!
//! String-in, string-out entry point for callers that cannot use an actor's native operations,
//! such as a workflow interpreter or a remote proxy. A target opts in by implementing
//! [`Invocable`]; the actor system then dispatches by actor name with
//! [`SystemRef::invoke`](crate::SystemRef::invoke).
//!

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A target that can run an action selected by name with a string-encoded argument list.
#[async_trait]
pub trait Invocable: Send + Sync + 'static {
    /// Runs `action` with `args`. `Ok` carries the result, `Err` the error message.
    async fn invoke(&self, action: &str, args: &str) -> Result<String, String>;
}

/// Outcome of a name-based invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeResult {
    /// True if the action ran and succeeded.
    pub success: bool,
    /// The result on success, the error message otherwise.
    pub payload: String,
}

impl InvokeResult {
    pub fn success(payload: impl Into<String>) -> Self {
        Self {
            success: true,
            payload: payload.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: message.into(),
        }
    }
}

impl From<Result<String, String>> for InvokeResult {
    fn from(result: Result<String, String>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(message) => Self::failure(message),
        }
    }
}

impl From<Error> for InvokeResult {
    fn from(error: Error) -> Self {
        Self::failure(error.to_string())
    }
}
