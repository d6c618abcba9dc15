// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor system
//!
//! The `system` module provides the `ActorSystem` type. An actor system owns the actors registered
//! in it by name and the worker pools they offload to, and tears both down in `terminate`.
//!
//! Names are unique within one system. Registering a second actor under a name that is already
//! taken replaces the mapping: the previous actor keeps running but can no longer be looked up,
//! and closing it later leaves the new mapping alone.
//!

use crate::{
    ActorRef, Error, Invocable, InvokeResult, SystemConfig,
    actor::{Lifecycle, Registration},
    handle::ResultHandle,
};

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use workpool::{PoolConfig, WorkerPool};

use std::{
    any::Any,
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

type Invoker =
    Arc<dyn Fn(&str, &str) -> ResultHandle<InvokeResult> + Send + Sync + 'static>;

/// One registered actor, seen three ways: for lifecycle, for typed lookup and for invocation.
struct Entry {
    actor: Arc<dyn Lifecycle>,
    any: Box<dyn Any + Send + Sync + 'static>,
    invoker: Option<Invoker>,
}

/// Actor system.
///
pub struct ActorSystem {}

impl ActorSystem {
    /// Create a new actor system and its default worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the default pool can't be started.
    ///
    pub fn create(config: SystemConfig) -> Result<SystemRef, Error> {
        let default_pool = WorkerPool::with_config(PoolConfig::new(
            &config.name,
            config.default_pool_workers,
        ))?;
        debug!("Actor system {} created.", config.name);
        Ok(SystemRef {
            inner: Arc::new(SystemInner {
                config,
                actors: RwLock::new(HashMap::new()),
                pools: parking_lot::RwLock::new(vec![default_pool.clone()]),
                default_pool,
                terminated: AtomicBool::new(false),
            }),
        })
    }
}

pub(crate) struct SystemInner {
    config: SystemConfig,
    actors: RwLock<HashMap<String, Entry>>,
    pools: parking_lot::RwLock<Vec<WorkerPool>>,
    default_pool: WorkerPool,
    terminated: AtomicBool,
}

/// System reference.
///
/// Cheap to clone. Every clone addresses the same registry and pools.
#[derive(Clone)]
pub struct SystemRef {
    inner: Arc<SystemInner>,
}

impl SystemRef {
    pub(crate) fn from_inner(inner: Arc<SystemInner>) -> Self {
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    fn check_running(&self) -> Result<(), Error> {
        if self.is_terminated() {
            Err(Error::Terminated(self.inner.config.name.clone()))
        } else {
            Ok(())
        }
    }

    /// Creates an actor wrapping `target` and registers it under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Terminated`] once the system has been terminated, or
    /// [`Error::Runtime`] outside a tokio runtime.
    ///
    pub async fn create_actor<T>(
        &self,
        name: &str,
        target: T,
    ) -> Result<ActorRef<T>, Error>
    where
        T: Send + Sync + 'static,
    {
        self.check_running()?;
        let actor =
            ActorRef::with_config(name, target, self.inner.config.actor.clone())?;
        self.register_or_close(name, &actor, None).await?;
        Ok(actor)
    }

    /// Like [`SystemRef::create_actor`], and makes the actor reachable through
    /// [`SystemRef::invoke`].
    pub async fn create_invocable_actor<T>(
        &self,
        name: &str,
        target: T,
    ) -> Result<ActorRef<T>, Error>
    where
        T: Invocable,
    {
        self.check_running()?;
        let actor =
            ActorRef::with_config(name, target, self.inner.config.actor.clone())?;
        self.register_or_close(name, &actor, Some(invoker(&actor)))
            .await?;
        Ok(actor)
    }

    /// Registers an actor created outside the system, under `name` or under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Terminated`] once the system has been terminated.
    ///
    pub async fn attach<T>(
        &self,
        actor: &ActorRef<T>,
        name: Option<&str>,
    ) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
    {
        let name = name.unwrap_or(actor.name()).to_owned();
        self.register(&name, actor, None).await
    }

    /// Like [`SystemRef::attach`], and makes the actor reachable through [`SystemRef::invoke`].
    pub async fn attach_invocable<T>(
        &self,
        actor: &ActorRef<T>,
        name: Option<&str>,
    ) -> Result<(), Error>
    where
        T: Invocable,
    {
        let name = name.unwrap_or(actor.name()).to_owned();
        self.register(&name, actor, Some(invoker(actor))).await
    }

    async fn register_or_close<T>(
        &self,
        name: &str,
        actor: &ActorRef<T>,
        invoker: Option<Invoker>,
    ) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
    {
        if let Err(error) = self.register(name, actor, invoker).await {
            actor.close().await;
            return Err(error);
        }
        Ok(())
    }

    async fn register<T>(
        &self,
        name: &str,
        actor: &ActorRef<T>,
        invoker: Option<Invoker>,
    ) -> Result<(), Error>
    where
        T: Send + Sync + 'static,
    {
        let mut actors = self.inner.actors.write().await;
        // Checked under the lock: terminate sets the flag before it drains the map.
        self.check_running()?;
        actor.attach_to(Registration {
            system: Arc::downgrade(&self.inner),
            key: name.to_owned(),
        });
        let entry = Entry {
            actor: Arc::new(actor.clone()),
            any: Box::new(actor.clone()),
            invoker,
        };
        if actors.insert(name.to_owned(), entry).is_some() {
            warn!(
                "Actor {} replaced an existing actor in system {}.",
                name, self.inner.config.name
            );
        } else {
            debug!(
                "Actor {} registered in system {}.",
                name, self.inner.config.name
            );
        }
        Ok(())
    }

    /// Retrieves an actor running in this actor system. If the actor does not exist, or it wraps
    /// a different target type, `None` is returned instead.
    ///
    pub async fn get_actor<T>(&self, name: &str) -> Option<ActorRef<T>>
    where
        T: Send + Sync + 'static,
    {
        let actors = self.inner.actors.read().await;
        actors
            .get(name)
            .and_then(|entry| entry.any.downcast_ref::<ActorRef<T>>().cloned())
    }

    /// True if a live actor is registered under `name`.
    pub async fn contains(&self, name: &str) -> bool {
        let actors = self.inner.actors.read().await;
        actors.get(name).is_some_and(|entry| entry.actor.is_alive())
    }

    /// Names of every registered actor, sorted.
    pub async fn actor_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.inner.actors.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes the actor registered under `name` and closes it. Returns false if there was none.
    pub async fn remove_actor(&self, name: &str) -> bool {
        let entry = self.inner.actors.write().await.remove(name);
        match entry {
            Some(entry) => {
                debug!(
                    "Removing actor {} from system {}.",
                    name, self.inner.config.name
                );
                entry.actor.close().await;
                true
            }
            None => false,
        }
    }

    /// Drops the mapping for `name` if it still belongs to the actor identified by `actor_key`.
    pub(crate) async fn unregister(&self, name: &str, actor_key: usize) {
        let mut actors = self.inner.actors.write().await;
        let owned = actors
            .get(name)
            .is_some_and(|entry| entry.actor.key() == actor_key);
        if owned {
            actors.remove(name);
            debug!(
                "Actor {} unregistered from system {}.",
                name, self.inner.config.name
            );
        }
    }

    /// Runs `action` on the invocable actor registered under `name` through its mailbox.
    ///
    /// Missing actors, actors that don't accept invocations and closed actors produce a failed
    /// [`InvokeResult`], never an error.
    pub async fn invoke(&self, name: &str, action: &str, args: &str) -> InvokeResult {
        let invoker = {
            let actors = self.inner.actors.read().await;
            match actors.get(name) {
                Some(entry) => entry.invoker.clone(),
                None => return InvokeResult::from(Error::NotFound(name.to_owned())),
            }
        };
        match invoker {
            Some(invoker) => invoker(action, args)
                .await
                .unwrap_or_else(InvokeResult::from),
            None => InvokeResult::failure(format!(
                "Actor {} does not accept invocations.",
                name
            )),
        }
    }

    /// Adds a worker pool to the system. Returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Terminated`] once the system has been terminated.
    ///
    pub fn add_pool(&self, pool: WorkerPool) -> Result<usize, Error> {
        self.check_running()?;
        let mut pools = self.inner.pools.write();
        debug!(
            "Worker pool {} added to system {} at index {}.",
            pool.name(),
            self.inner.config.name,
            pools.len()
        );
        pools.push(pool);
        Ok(pools.len() - 1)
    }

    /// Worker pool at `index`. Index 0 is the default pool.
    pub fn pool(&self, index: usize) -> Option<WorkerPool> {
        self.inner.pools.read().get(index).cloned()
    }

    pub fn default_pool(&self) -> WorkerPool {
        self.inner.default_pool.clone()
    }

    pub fn pool_count(&self) -> usize {
        self.inner.pools.read().len()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    /// Closes every registered actor, then shuts down every worker pool.
    ///
    /// Each pool gets [`SystemConfig::pool_shutdown_timeout`] to drain before its queue is
    /// dropped. Jobs already running can't be stopped; `terminate` returns without them. Calling
    /// it again is a no-op.
    pub async fn terminate(&self) {
        if self.inner.terminated.swap(true, Ordering::AcqRel) {
            debug!(
                "Actor system {} is already terminated.",
                self.inner.config.name
            );
            return;
        }
        debug!("Terminating actor system {}.", self.inner.config.name);

        let entries: Vec<Entry> = self
            .inner
            .actors
            .write()
            .await
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        debug!("Closing {} actors.", entries.len());
        join_all(entries.iter().map(|entry| entry.actor.close())).await;

        let pools = self.inner.pools.read().clone();
        let grace = self.inner.config.pool_shutdown_timeout;
        join_all(pools.into_iter().map(|pool| shutdown_pool(pool, grace))).await;
        debug!("Actor system {} terminated.", self.inner.config.name);
    }
}

fn invoker<T>(actor: &ActorRef<T>) -> Invoker
where
    T: Invocable,
{
    let actor = actor.clone();
    Arc::new(move |action: &str, args: &str| actor.invoke(action, args))
}

/// Graceful shutdown, escalated to `shutdown_now` after `grace`.
async fn shutdown_pool(pool: WorkerPool, grace: Duration) {
    pool.shutdown();
    let waiting = pool.clone();
    let drained = tokio::task::spawn_blocking(move || waiting.await_termination(grace))
        .await
        .unwrap_or(false);
    if !drained {
        let dropped = pool.shutdown_now();
        warn!(
            "Worker pool {} did not stop within {:?}, {} queued jobs dropped.",
            pool.name(),
            grace,
            dropped
        );
    }
}
