// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # State Store Port
//!
//! Persistence contract for swarm snapshots. The store holds a derived,
//! eventually-consistent copy of the registry used only for crash recovery;
//! the in-memory registry stays authoritative.
//!
//! | Key | Value |
//! |-----|-------|
//! | `swarm/{id}/state` | JSON snapshot of the swarm and its agents |
//!
//! Implementations live in `crate::infrastructure::state_store`.

use crate::domain::swarm::SwarmId;
use async_trait::async_trait;
use std::time::Duration;

/// Prefix shared by every swarm-scoped key.
pub const SWARM_KEY_PREFIX: &str = "swarm/";

const STATE_KEY_SUFFIX: &str = "/state";

pub fn swarm_state_key(swarm_id: SwarmId) -> String {
    format!("{}{}{}", SWARM_KEY_PREFIX, swarm_id, STATE_KEY_SUFFIX)
}

/// Whether `key` names a swarm snapshot (as opposed to other swarm-scoped data).
pub fn is_swarm_state_key(key: &str) -> bool {
    key.starts_with(SWARM_KEY_PREFIX) && key.ends_with(STATE_KEY_SUFFIX)
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Insert or replace `key`. Entries with a `ttl` disappear once it elapses.
    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
