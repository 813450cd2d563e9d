// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::error::SwarmError;
use crate::domain::swarm::SwarmId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of worker roles. Behaviour for a role lives with the task
/// executor; the control plane only needs the tag for bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    GeneralistCoder,
    Reviewer,
    Tester,
    Researcher,
    Planner,
    Documenter,
    BackendSpecialist,
    FrontendSpecialist,
    ArchitectureSpecialist,
    DatabaseSpecialist,
    DevopsSpecialist,
    SecuritySpecialist,
    PerformanceSpecialist,
    MlSpecialist,
    ApiSpecialist,
    IntegrationSpecialist,
}

impl AgentType {
    pub const ALL: [AgentType; 16] = [
        AgentType::GeneralistCoder,
        AgentType::Reviewer,
        AgentType::Tester,
        AgentType::Researcher,
        AgentType::Planner,
        AgentType::Documenter,
        AgentType::BackendSpecialist,
        AgentType::FrontendSpecialist,
        AgentType::ArchitectureSpecialist,
        AgentType::DatabaseSpecialist,
        AgentType::DevopsSpecialist,
        AgentType::SecuritySpecialist,
        AgentType::PerformanceSpecialist,
        AgentType::MlSpecialist,
        AgentType::ApiSpecialist,
        AgentType::IntegrationSpecialist,
    ];

    /// Types handed out round-robin when a scale-up or a `min_workers` top-up
    /// does not name a role.
    pub const DEFAULT_ROTATION: [AgentType; 3] = [
        AgentType::GeneralistCoder,
        AgentType::Tester,
        AgentType::Reviewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::GeneralistCoder => "generalist-coder",
            AgentType::Reviewer => "reviewer",
            AgentType::Tester => "tester",
            AgentType::Researcher => "researcher",
            AgentType::Planner => "planner",
            AgentType::Documenter => "documenter",
            AgentType::BackendSpecialist => "backend-specialist",
            AgentType::FrontendSpecialist => "frontend-specialist",
            AgentType::ArchitectureSpecialist => "architecture-specialist",
            AgentType::DatabaseSpecialist => "database-specialist",
            AgentType::DevopsSpecialist => "devops-specialist",
            AgentType::SecuritySpecialist => "security-specialist",
            AgentType::PerformanceSpecialist => "performance-specialist",
            AgentType::MlSpecialist => "ml-specialist",
            AgentType::ApiSpecialist => "api-specialist",
            AgentType::IntegrationSpecialist => "integration-specialist",
        }
    }

    /// Round-robin default type for position `cursor`.
    pub fn rotation(cursor: usize) -> AgentType {
        Self::DEFAULT_ROTATION[cursor % Self::DEFAULT_ROTATION.len()]
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        // Short aliases accepted on the CLI
        let normalized = match normalized.as_str() {
            "coder" => "generalist-coder",
            "architect" => "architecture-specialist",
            "backend" => "backend-specialist",
            "frontend" => "frontend-specialist",
            other => other,
        };
        AgentType::ALL
            .iter()
            .find(|t| t.as_str() == normalized)
            .copied()
            .ok_or_else(|| SwarmError::InvalidConfig(format!("unknown agent type '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
    Failed,
    Draining,
    Removed,
}

impl AgentStatus {
    /// Member of the active worker pool (counts toward `worker_count`).
    pub fn is_active(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Busy)
    }

    /// Still holds a worker process (active or on its way out).
    pub fn is_live(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Busy | AgentStatus::Draining)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
            AgentStatus::Failed => "failed",
            AgentStatus::Draining => "draining",
            AgentStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

impl FromStr for AgentStatus {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(AgentStatus::Idle),
            "busy" => Ok(AgentStatus::Busy),
            "failed" => Ok(AgentStatus::Failed),
            "draining" => Ok(AgentStatus::Draining),
            "removed" => Ok(AgentStatus::Removed),
            other => Err(SwarmError::InvalidConfig(format!("unknown agent status '{}'", other))),
        }
    }
}

/// A worker agent owned by exactly one swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    swarm_id: SwarmId,
    pub agent_type: AgentType,
    pub status: AgentStatus,
    pub spawned_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub spawn_attempts: u32,
}

impl Agent {
    pub fn new(swarm_id: SwarmId, agent_type: AgentType) -> Self {
        Self {
            id: AgentId::new(),
            swarm_id,
            agent_type,
            status: AgentStatus::Idle,
            spawned_at: Utc::now(),
            ended_at: None,
            spawn_attempts: 0,
        }
    }

    /// Owning swarm. Fixed at creation.
    pub fn swarm_id(&self) -> SwarmId {
        self.swarm_id
    }

    pub fn mark_failed(&mut self) {
        self.status = AgentStatus::Failed;
        self.ended_at = Some(Utc::now());
    }

    pub fn mark_removed(&mut self) {
        self.status = AgentStatus::Removed;
        self.ended_at = Some(Utc::now());
    }
}
