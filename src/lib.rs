//! Core library for the Relay actor runtime.
//! Wraps plain values behind actors with ordered mailboxes, bypass access and cancellable
//! offloading to shared worker pools, all owned by a named actor system.

pub use actor::{
    ActorConfig, ActorRef, ActorSystem, DEFAULT_CLOSE_TIMEOUT,
    DEFAULT_POOL_SHUTDOWN_TIMEOUT, Error as ActorError, Invocable, InvokeResult,
    ResultHandle, SystemConfig, SystemRef,
};

pub use workpool::{Error as PoolError, JobHandle, PoolConfig, WorkerPool};
