// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-Process Agent Runtime
//!
//! Tracks workers as entries in a concurrent map. No process is launched;
//! used by the CLI's embedded control plane and by tests.

use crate::domain::agent::{Agent, AgentId, AgentType};
use crate::domain::runtime::{AgentRuntime, RuntimeError};
use crate::domain::swarm::SwarmId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Running,
    Stopping,
}

#[derive(Debug, Clone)]
pub struct WorkerRecord {
    pub swarm_id: SwarmId,
    pub agent_type: AgentType,
    pub phase: WorkerPhase,
}

#[derive(Debug, Clone, Default)]
pub struct InProcessAgentRuntime {
    workers: Arc<DashMap<AgentId, WorkerRecord>>,
}

impl InProcessAgentRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn worker(&self, agent_id: AgentId) -> Option<WorkerRecord> {
        self.workers.get(&agent_id).map(|w| w.value().clone())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

#[async_trait]
impl AgentRuntime for InProcessAgentRuntime {
    async fn spawn(&self, agent: &Agent) -> Result<(), RuntimeError> {
        debug!(agent_id = %agent.id, agent_type = %agent.agent_type, "Starting in-process worker");
        self.workers.insert(
            agent.id,
            WorkerRecord {
                swarm_id: agent.swarm_id(),
                agent_type: agent.agent_type,
                phase: WorkerPhase::Running,
            },
        );
        Ok(())
    }

    async fn signal_stop(&self, agent_id: AgentId) -> Result<(), RuntimeError> {
        match self.workers.get_mut(&agent_id) {
            Some(mut worker) => {
                worker.phase = WorkerPhase::Stopping;
                Ok(())
            }
            None => Err(RuntimeError::NotFound(agent_id)),
        }
    }

    async fn terminate(&self, agent_id: AgentId) -> Result<(), RuntimeError> {
        if self.workers.remove(&agent_id).is_some() {
            debug!(agent_id = %agent_id, "Released in-process worker");
        }
        Ok(())
    }
}
