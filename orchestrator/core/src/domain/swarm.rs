// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Aggregate
//!
//! A **Swarm** is a capacity-bounded pool of worker agents pursuing a single
//! objective under one coordinator.
//!
//! ## Status Machine
//!
//! ```text
//! spawning ──► active ◄──► scaling
//!    │           │            │
//!    │           └──► draining ◄┘
//!    │                   │
//!    └─────────────► terminated
//! ```
//!
//! `spawning`, `active` and `scaling` occupy one slot of the process-wide
//! active-swarm cap. A terminated swarm is kept as a read-only record.

use crate::domain::agent::AgentType;
use crate::domain::error::SwarmError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a [`Swarm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwarmId(pub Uuid);

impl SwarmId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SwarmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Hierarchical,
    Mesh,
    Adaptive,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Topology::Hierarchical => "hierarchical",
            Topology::Mesh => "mesh",
            Topology::Adaptive => "adaptive",
        };
        f.write_str(s)
    }
}

impl FromStr for Topology {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hierarchical" => Ok(Topology::Hierarchical),
            "mesh" => Ok(Topology::Mesh),
            "adaptive" => Ok(Topology::Adaptive),
            other => Err(SwarmError::InvalidConfig(format!("unknown topology '{}'", other))),
        }
    }
}

/// Strategy the coordinator ("queen") applies when it consults the decision router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueenType {
    Strategic,
    Adaptive,
}

impl fmt::Display for QueenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueenType::Strategic => f.write_str("strategic"),
            QueenType::Adaptive => f.write_str("adaptive"),
        }
    }
}

impl FromStr for QueenType {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strategic" => Ok(QueenType::Strategic),
            "adaptive" => Ok(QueenType::Adaptive),
            other => Err(SwarmError::InvalidConfig(format!("unknown queen type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmStatus {
    Spawning,
    Active,
    Scaling,
    Draining,
    Terminated,
}

impl SwarmStatus {
    /// Whether a swarm in this status counts against the global active-swarm cap.
    pub fn occupies_capacity(&self) -> bool {
        matches!(self, SwarmStatus::Spawning | SwarmStatus::Active | SwarmStatus::Scaling)
    }

    /// Whether add/remove/scale operations are accepted.
    pub fn accepts_mutations(&self) -> bool {
        !matches!(self, SwarmStatus::Draining | SwarmStatus::Terminated)
    }

    fn can_transition_to(&self, next: SwarmStatus) -> bool {
        use SwarmStatus::*;
        matches!(
            (self, next),
            (Spawning, Active)
                | (Spawning, Terminated)
                | (Active, Scaling)
                | (Active, Draining)
                | (Scaling, Active)
                | (Scaling, Draining)
                | (Draining, Terminated)
        )
    }
}

impl fmt::Display for SwarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwarmStatus::Spawning => "spawning",
            SwarmStatus::Active => "active",
            SwarmStatus::Scaling => "scaling",
            SwarmStatus::Draining => "draining",
            SwarmStatus::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Parameters of a `spawn_swarm` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmSpec {
    pub objective: String,
    pub topology: Topology,
    pub queen_type: QueenType,
    pub min_workers: usize,
    pub max_workers: usize,
    #[serde(default)]
    pub initial_agents: Vec<AgentType>,
    #[serde(default)]
    pub auto_scale: bool,
}

impl SwarmSpec {
    pub fn validate(&self) -> Result<(), SwarmError> {
        if self.objective.trim().is_empty() {
            return Err(SwarmError::InvalidConfig("objective cannot be empty".to_string()));
        }
        if self.max_workers == 0 {
            return Err(SwarmError::InvalidConfig("max_workers must be at least 1".to_string()));
        }
        if self.min_workers > self.max_workers {
            return Err(SwarmError::InvalidConfig(format!(
                "min_workers ({}) exceeds max_workers ({})",
                self.min_workers, self.max_workers
            )));
        }
        if self.initial_agents.len() > self.max_workers {
            return Err(SwarmError::InvalidConfig(format!(
                "{} initial agents requested but max_workers is {}",
                self.initial_agents.len(),
                self.max_workers
            )));
        }
        Ok(())
    }
}

/// Aggregate root for a pool of coordinated worker agents.
///
/// # Invariants
///
/// - `min_workers <= worker_count <= max_workers` whenever `status == Active`
///   (the agent list itself lives in the registry that owns the swarm).
/// - Status only moves along the edges of the status machine above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swarm {
    pub id: SwarmId,
    pub objective: String,
    pub topology: Topology,
    pub queen_type: QueenType,
    pub status: SwarmStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub min_workers: usize,
    pub max_workers: usize,
    pub auto_scale_enabled: bool,
}

impl Swarm {
    /// Create a swarm in `spawning` status from a validated spec.
    pub fn new(spec: &SwarmSpec) -> Self {
        Self {
            id: SwarmId::new(),
            objective: spec.objective.trim().to_string(),
            topology: spec.topology,
            queen_type: spec.queen_type,
            status: SwarmStatus::Spawning,
            created_at: Utc::now(),
            ended_at: None,
            min_workers: spec.min_workers,
            max_workers: spec.max_workers,
            auto_scale_enabled: spec.auto_scale,
        }
    }

    /// Clamp a requested worker count into `[min_workers, max_workers]`.
    pub fn clamp_target(&self, target: usize) -> usize {
        target.clamp(self.min_workers, self.max_workers)
    }

    /// Move to `next`, rejecting edges outside the status machine.
    pub fn transition(&mut self, next: SwarmStatus) -> Result<(), SwarmError> {
        if !self.status.can_transition_to(next) {
            return Err(SwarmError::InvalidState {
                swarm_id: self.id,
                status: self.status,
                operation: "transition",
            });
        }
        self.status = next;
        if next == SwarmStatus::Terminated {
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(min: usize, max: usize, initial: usize) -> SwarmSpec {
        SwarmSpec {
            objective: "build X".to_string(),
            topology: Topology::Hierarchical,
            queen_type: QueenType::Strategic,
            min_workers: min,
            max_workers: max,
            initial_agents: vec![AgentType::GeneralistCoder; initial],
            auto_scale: false,
        }
    }

    #[test]
    fn test_spec_validation() {
        assert!(spec(2, 10, 2).validate().is_ok());
        assert!(matches!(spec(5, 3, 0).validate(), Err(SwarmError::InvalidConfig(_))));
        assert!(matches!(spec(1, 2, 3).validate(), Err(SwarmError::InvalidConfig(_))));
        assert!(matches!(spec(0, 0, 0).validate(), Err(SwarmError::InvalidConfig(_))));

        let mut blank = spec(1, 2, 1);
        blank.objective = "   ".to_string();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_status_machine() {
        let mut swarm = Swarm::new(&spec(1, 4, 1));
        assert_eq!(swarm.status, SwarmStatus::Spawning);
        assert!(swarm.status.occupies_capacity());

        swarm.transition(SwarmStatus::Active).unwrap();
        swarm.transition(SwarmStatus::Scaling).unwrap();
        swarm.transition(SwarmStatus::Active).unwrap();

        // Cannot skip the drain phase
        assert!(matches!(
            swarm.transition(SwarmStatus::Terminated),
            Err(SwarmError::InvalidState { .. })
        ));

        swarm.transition(SwarmStatus::Draining).unwrap();
        assert!(!swarm.status.accepts_mutations());
        assert!(!swarm.status.occupies_capacity());

        swarm.transition(SwarmStatus::Terminated).unwrap();
        assert!(swarm.ended_at.is_some());
        assert!(swarm.transition(SwarmStatus::Active).is_err());
    }

    #[test]
    fn test_clamp_target() {
        let swarm = Swarm::new(&spec(2, 10, 2));
        assert_eq!(swarm.clamp_target(15), 10);
        assert_eq!(swarm.clamp_target(0), 2);
        assert_eq!(swarm.clamp_target(7), 7);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Mesh".parse::<Topology>().unwrap(), Topology::Mesh);
        assert_eq!("strategic".parse::<QueenType>().unwrap(), QueenType::Strategic);
        assert!("ring".parse::<Topology>().is_err());
    }
}
