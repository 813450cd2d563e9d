// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Runtime
//!
//! Worker-process boundary for agents.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Abstract how a worker agent is started and stopped so the
//!   lifecycle manager can retry, drain and force-remove without knowing the
//!   process model

use crate::domain::agent::{Agent, AgentId};
use async_trait::async_trait;

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Start the worker backing `agent`. May fail transiently; the caller retries.
    async fn spawn(&self, agent: &Agent) -> Result<(), RuntimeError>;

    /// Ask a busy worker to finish its current task and stop accepting work.
    async fn signal_stop(&self, agent_id: AgentId) -> Result<(), RuntimeError>;

    /// Release the worker immediately. Must be idempotent.
    async fn terminate(&self, agent_id: AgentId) -> Result<(), RuntimeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Failed to start worker: {0}")]
    SpawnFailed(String),

    #[error("Worker {0} not found")]
    NotFound(AgentId),

    #[error("Runtime error: {0}")]
    Internal(String),
}
