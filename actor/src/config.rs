// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Configuration
//!
//! Settings for actors and actor systems. Both types deserialize with every field optional, so an
//! embedding application can load them from whatever format it already uses.
//!

use serde::{Deserialize, Serialize};

use std::time::Duration;

/// Default bound on how long `close` waits for an actor's run loop.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default grace period for worker pools during system termination.
pub const DEFAULT_POOL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-actor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// How long `close` waits for the run loop before aborting it.
    pub close_timeout: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl ActorConfig {
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

/// Actor system settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Name of the system. Also the name of its default worker pool.
    pub name: String,
    /// Worker threads in the default pool.
    pub default_pool_workers: usize,
    /// Grace period for each pool during `terminate` before queued jobs are dropped.
    pub pool_shutdown_timeout: Duration,
    /// Settings applied to actors created by the system.
    pub actor: ActorConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "system".to_owned(),
            default_pool_workers: num_cpus::get(),
            pool_shutdown_timeout: DEFAULT_POOL_SHUTDOWN_TIMEOUT,
            actor: ActorConfig::default(),
        }
    }
}

impl SystemConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn with_default_pool_workers(mut self, workers: usize) -> Self {
        self.default_pool_workers = workers;
        self
    }

    pub fn with_pool_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.pool_shutdown_timeout = timeout;
        self
    }

    pub fn with_actor_config(mut self, actor: ActorConfig) -> Self {
        self.actor = actor;
        self
    }
}
