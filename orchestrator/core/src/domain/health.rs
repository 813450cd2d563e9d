// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Health & Utilization
//!
//! Derived, read-only views over a swarm's agent list.
//!
//! ## Health Classification
//! | Condition | Health |
//! |-----------|--------|
//! | failed ratio > 30% or zero active workers | `critical` |
//! | failed ratio 10–30%, utilization > 90%, or coordinator degraded | `degraded` |
//! | otherwise | `healthy` |
//!
//! Utilization below 10% is intentionally still `healthy`: an idle swarm is
//! a scale-down signal for the auto-scaler, not a fault.

use crate::domain::agent::{Agent, AgentStatus};
use crate::domain::coordinator::DecisionSource;
use crate::domain::swarm::Swarm;
use serde::{Deserialize, Serialize};
use std::fmt;

const CRITICAL_FAILED_RATIO: f64 = 0.30;
const DEGRADED_FAILED_RATIO: f64 = 0.10;
const DEGRADED_UTILIZATION: f64 = 0.90;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    pub idle: usize,
    pub busy: usize,
    pub failed: usize,
    pub draining: usize,
    pub removed: usize,
}

impl WorkerCounts {
    pub fn tally<'a>(agents: impl IntoIterator<Item = &'a Agent>) -> Self {
        let mut counts = Self::default();
        for agent in agents {
            match agent.status {
                AgentStatus::Idle => counts.idle += 1,
                AgentStatus::Busy => counts.busy += 1,
                AgentStatus::Failed => counts.failed += 1,
                AgentStatus::Draining => counts.draining += 1,
                AgentStatus::Removed => counts.removed += 1,
            }
        }
        counts
    }

    /// Size of the active pool (`idle + busy`).
    pub fn active(&self) -> usize {
        self.idle + self.busy
    }

    /// Share of failed agents among every agent not yet removed.
    pub fn failed_ratio(&self) -> f64 {
        let denominator = self.active() + self.draining + self.failed;
        if denominator == 0 {
            0.0
        } else {
            self.failed as f64 / denominator as f64
        }
    }
}

/// `busy / max(total, 1)` at a point in time. Auto-scaler input only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationSnapshot {
    pub busy: usize,
    pub total: usize,
    pub utilization: f64,
}

impl UtilizationSnapshot {
    pub fn new(busy: usize, total: usize) -> Self {
        Self {
            busy,
            total,
            utilization: busy as f64 / total.max(1) as f64,
        }
    }

    pub fn from_counts(counts: &WorkerCounts) -> Self {
        Self::new(counts.busy, counts.active())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmHealth {
    Healthy,
    Degraded,
    Critical,
}

impl SwarmHealth {
    pub fn classify(counts: &WorkerCounts, coordinator_degraded: bool) -> Self {
        let failed_ratio = counts.failed_ratio();
        let utilization = UtilizationSnapshot::from_counts(counts).utilization;

        if counts.active() == 0 || failed_ratio > CRITICAL_FAILED_RATIO {
            SwarmHealth::Critical
        } else if failed_ratio >= DEGRADED_FAILED_RATIO
            || utilization > DEGRADED_UTILIZATION
            || coordinator_degraded
        {
            SwarmHealth::Degraded
        } else {
            SwarmHealth::Healthy
        }
    }
}

impl fmt::Display for SwarmHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmHealth::Healthy => f.write_str("healthy"),
            SwarmHealth::Degraded => f.write_str("degraded"),
            SwarmHealth::Critical => f.write_str("critical"),
        }
    }
}

/// Result of `get_swarm_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmStatusReport {
    pub swarm: Swarm,
    pub counts: WorkerCounts,
    pub worker_count: usize,
    pub utilization: f64,
    pub decision_source: DecisionSource,
    pub pending_decisions: usize,
    pub health: SwarmHealth,
    pub agents: Vec<Agent>,
}
