// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Cancellable worker pool
//!
//! A shared pool of OS worker threads for CPU-heavy work submitted on behalf of named owners.
//!
//! - [`WorkerPool::submit_for_actor`] queues a job at the tail, tagged with its owner.
//! - [`WorkerPool::submit_urgent_for_actor`] queues it at the head.
//! - [`WorkerPool::cancel_jobs_for_actor`] withdraws every job of one owner that has not started
//!   yet, leaving other owners' jobs and any running job untouched.
//!
//! Every submission returns a [`JobHandle`] that resolves with the job's value, its panic, or
//! [`Error::Cancelled`] when the job was withdrawn.
//!
//! ```ignore
//! use workpool::{PoolConfig, WorkerPool};
//!
//! let pool = WorkerPool::with_config(PoolConfig::new("compute", 4))?;
//! let handle = pool.submit_for_actor("resizer", || expensive());
//! pool.cancel_jobs_for_actor("resizer");
//! pool.shutdown();
//! ```
//!

mod error;
mod job;
mod pool;

pub use error::{Error, panic_message};
pub use job::JobHandle;
pub use pool::{PoolConfig, WorkerPool};
