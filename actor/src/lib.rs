// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Relay Actor Runtime
//!
//! An actor runtime that wraps arbitrary values ("targets") behind a reference that serializes
//! access to them through a mailbox, while still allowing controlled concurrent access when a
//! caller asks for it.
//!
//! ## Overview
//!
//! An [`ActorRef`] owns one target, one FIFO mailbox and one tokio task that drains the mailbox
//! strictly in order. Operations are closures over the target:
//!
//! - **Ordered**: [`ActorRef::tell`] and [`ActorRef::ask`] queue the operation. Ordered
//!   operations run one at a time, in the order they were sent.
//! - **Bypass**: [`ActorRef::tell_now`] and [`ActorRef::ask_now`] start the operation at once on
//!   a fresh task, concurrently with the mailbox. Meant for health checks, emergency stops and
//!   live state peeks that must never wait behind a slow queued operation.
//! - **Offload**: [`ActorRef::tell_on`] and [`ActorRef::ask_on`] run the operation on a shared
//!   [`WorkerPool`] thread, tagged with [`ActorRef::pool_owner`] so the actor can later withdraw
//!   its own backlog with [`ActorRef::clear_pending_messages`] without touching other actors'
//!   jobs.
//!
//! Every operation returns a [`ResultHandle`]: a future (or a blocking [`ResultHandle::wait`])
//! resolving to the operation's value or an [`Error`]. A panic inside an operation resolves its
//! handle with [`Error::Panicked`] and never stops the run loop.
//!
//! ## Shared targets
//!
//! The target is stored as `Arc<T>` and every path gets a shared reference to it, so `T` must be
//! `Send + Sync`. Bypass and offloaded operations may run while an ordered operation is running:
//! whatever they read can be stale, and whatever they write must go through the target's own
//! interior mutability. The ordered path only adds one guarantee, no two ordered operations
//! overlap.
//!
//! ## Actor system
//!
//! A [`SystemRef`], created with [`ActorSystem::create`], keeps actors by name and owns the
//! worker pools they offload to. Schedulers, workflow engines and remote proxies resolve actors
//! through it by name and call them through the string-based [`Invocable`] contract with
//! [`SystemRef::invoke`]. [`SystemRef::terminate`] closes every actor and shuts every pool down
//! with a bounded grace period.
//!
//! ## Getting Started
//!
//! ```ignore
//! use actor::{ActorSystem, SystemConfig};
//! use parking_lot::Mutex;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), actor::Error> {
//!     let system = ActorSystem::create(SystemConfig::new("app"))?;
//!     let words = system.create_actor("words", Mutex::new(Vec::<String>::new())).await?;
//!
//!     for word in ["Hello", "World"] {
//!         let _ = words.tell(move |list| async move {
//!             list.lock().push(word.to_owned());
//!         });
//!     }
//!     let joined = words.ask(|list| async move { list.lock().join(" ") }).await?;
//!     assert_eq!(joined, "Hello World");
//!
//!     let pool = system.default_pool();
//!     let length = words.ask_on(&pool, |list| list.lock().len()).await?;
//!     assert_eq!(length, 2);
//!
//!     system.terminate().await;
//!     Ok(())
//! }
//! ```
//!

// Private modules containing the implementation
mod actor;
mod config;
mod error;
mod handle;
mod invoke;
mod mailbox;
mod runner;
mod system;

//
// Actors
//

/// Reference to a running actor, used to send it operations.
pub use actor::ActorRef;

/// Eventual outcome of one operation sent to an actor.
pub use handle::ResultHandle;

//
// Configuration
//

pub use config::{
    ActorConfig, DEFAULT_CLOSE_TIMEOUT, DEFAULT_POOL_SHUTDOWN_TIMEOUT, SystemConfig,
};

//
// Error Handling
//

/// Error type for every actor and actor system operation.
pub use error::Error;

//
// Name-based invocation
//

pub use invoke::{Invocable, InvokeResult};

//
// System Management
//

/// Entry point for creating actor systems.
pub use system::ActorSystem;

/// Reference to an actor system: the registry of actors by name and the owner of its worker
/// pools.
pub use system::SystemRef;

//
// Worker pools
//

pub use workpool::{JobHandle, PoolConfig, WorkerPool};
