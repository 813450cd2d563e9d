// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Snapshot
//!
//! Persisted form of a [`SwarmState`], stored under `swarm/{id}/state`.
//!
//! ## Recovery Rules
//!
//! A snapshot captured mid-operation is normalized on restore:
//!
//! | Persisted status | Restored status |
//! |------------------|-----------------|
//! | `spawning` | `terminated` (agents removed) |
//! | `scaling` | `active` |
//! | `draining` | `terminated` (agents removed) |
//! | `active`, `terminated` | unchanged |
//!
//! Draining agents are restored as removed; pending drain acknowledgements
//! do not survive a restart.

use crate::domain::registry::SwarmState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use swarmforge_core::domain::agent::{Agent, AgentStatus};
use swarmforge_core::domain::swarm::{Swarm, SwarmStatus};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmSnapshot {
    pub version: u32,
    pub swarm: Swarm,
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub rotation_cursor: usize,
    pub captured_at: DateTime<Utc>,
}

impl SwarmSnapshot {
    pub fn capture(state: &SwarmState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            swarm: state.swarm.clone(),
            agents: state.agents.clone(),
            rotation_cursor: state.rotation_cursor,
            captured_at: Utc::now(),
        }
    }

    /// Rebuild registry state, applying the recovery rules. The flag reports
    /// whether normalization changed anything (the caller re-persists then).
    pub fn recover(self) -> (SwarmState, bool) {
        let mut swarm = self.swarm;
        let mut agents = self.agents;
        let mut changed = false;

        for agent in agents.iter_mut().filter(|a| a.status == AgentStatus::Draining) {
            agent.mark_removed();
            changed = true;
        }

        let next = match swarm.status {
            SwarmStatus::Spawning | SwarmStatus::Draining => Some(SwarmStatus::Terminated),
            SwarmStatus::Scaling => Some(SwarmStatus::Active),
            SwarmStatus::Active | SwarmStatus::Terminated => None,
        };

        if let Some(next) = next {
            if next == SwarmStatus::Terminated {
                for agent in agents.iter_mut().filter(|a| a.status.is_active()) {
                    agent.mark_removed();
                }
            }
            // Every rewrite above is a legal edge of the status machine
            if swarm.transition(next).is_err() {
                swarm.status = next;
            }
            changed = true;
        }

        let state = SwarmState {
            swarm,
            agents,
            drained: HashSet::new(),
            rotation_cursor: self.rotation_cursor,
        };
        (state, changed)
    }
}
