// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Control Plane Error Taxonomy
//!
//! Every public lifecycle operation returns `Result<_, SwarmError>`.
//!
//! | Variant | Retried? | Surfaces when |
//! |---------|----------|---------------|
//! | `PermissionDenied` | never | Auth Gate refused the token or the permission |
//! | `SwarmNotFound` / `AgentNotFound` | never | unknown identifier |
//! | `InvalidConfig` | never | bad spawn/add parameters |
//! | `InvalidState` | never | operation not valid for the swarm's status |
//! | `CapacityExceeded` | never | global or per-swarm cap reached |
//! | `MinWorkersViolation` | never | removal would go below `min_workers` |
//! | `SpawnFailed` | after local retries | every spawn in a batch failed |
//! | `Backpressure` | never | too many in-flight decision requests |
//! | `DecisionUnavailable` | after fallback | both reasoning backends failed |

use crate::domain::agent::AgentId;
use crate::domain::security::Permission;
use crate::domain::swarm::{SwarmId, SwarmStatus};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SwarmError {
    #[error("permission denied for '{principal}': '{permission}' required")]
    PermissionDenied {
        principal: String,
        permission: Permission,
    },

    #[error("swarm {0} not found")]
    SwarmNotFound(SwarmId),

    #[error("agent {agent_id} not found in swarm {swarm_id}")]
    AgentNotFound { swarm_id: SwarmId, agent_id: AgentId },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("swarm {swarm_id} is {status}; '{operation}' is not allowed")]
    InvalidState {
        swarm_id: SwarmId,
        status: SwarmStatus,
        operation: &'static str,
    },

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("swarm {swarm_id} would drop to {remaining} workers, below the minimum of {min_workers}")]
    MinWorkersViolation {
        swarm_id: SwarmId,
        min_workers: usize,
        remaining: usize,
    },

    #[error("agent spawn failed: {0}")]
    SpawnFailed(String),

    #[error("swarm {swarm_id} already has {in_flight} decision requests in flight (cap {cap})")]
    Backpressure {
        swarm_id: SwarmId,
        in_flight: usize,
        cap: usize,
    },

    #[error("decision unavailable: {0}")]
    DecisionUnavailable(String),
}

impl SwarmError {
    /// Stable failure code printed by the CLI.
    pub fn code(&self) -> &'static str {
        match self {
            SwarmError::PermissionDenied { .. } => "PermissionDenied",
            SwarmError::SwarmNotFound(_) => "SwarmNotFound",
            SwarmError::AgentNotFound { .. } => "AgentNotFound",
            SwarmError::InvalidConfig(_) => "InvalidConfig",
            SwarmError::InvalidState { .. } => "InvalidState",
            SwarmError::CapacityExceeded(_) => "CapacityExceeded",
            SwarmError::MinWorkersViolation { .. } => "MinWorkersViolation",
            SwarmError::SpawnFailed(_) => "SpawnFailed",
            SwarmError::Backpressure { .. } => "Backpressure",
            SwarmError::DecisionUnavailable(_) => "DecisionUnavailable",
        }
    }

    /// Process exit code for the CLI surface. `0` is reserved for success and
    /// `1` for failures outside the taxonomy (config, I/O).
    pub fn exit_code(&self) -> u8 {
        match self {
            SwarmError::PermissionDenied { .. } => 10,
            SwarmError::SwarmNotFound(_) => 11,
            SwarmError::AgentNotFound { .. } => 12,
            SwarmError::InvalidConfig(_) => 13,
            SwarmError::InvalidState { .. } => 14,
            SwarmError::CapacityExceeded(_) => 15,
            SwarmError::MinWorkersViolation { .. } => 16,
            SwarmError::SpawnFailed(_) => 17,
            SwarmError::Backpressure { .. } => 18,
            SwarmError::DecisionUnavailable(_) => 19,
        }
    }

    /// Validation failures are returned synchronously and never retried.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            SwarmError::SpawnFailed(_)
                | SwarmError::Backpressure { .. }
                | SwarmError::DecisionUnavailable(_)
        )
    }
}
