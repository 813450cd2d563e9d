// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::agent::{AgentId, AgentType};
use crate::domain::coordinator::DecisionSource;
use crate::domain::swarm::SwarmId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle notifications published on the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SwarmEvent {
    SwarmSpawned {
        swarm_id: SwarmId,
        objective: String,
        worker_count: usize,
        auto_scale: bool,
        actor: String,
        spawned_at: DateTime<Utc>,
    },
    SwarmSpawnFailed {
        swarm_id: SwarmId,
        reason: String,
        actor: String,
        failed_at: DateTime<Utc>,
    },
    AgentsAdded {
        swarm_id: SwarmId,
        agent_type: AgentType,
        agent_ids: Vec<AgentId>,
        failed: usize,
        actor: String,
        added_at: DateTime<Utc>,
    },
    AgentFailed {
        swarm_id: SwarmId,
        agent_id: AgentId,
        attempts: u32,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    AgentRemoved {
        swarm_id: SwarmId,
        agent_id: AgentId,
        forced: bool,
        actor: String,
        removed_at: DateTime<Utc>,
    },
    SwarmScaled {
        swarm_id: SwarmId,
        from: usize,
        requested: usize,
        realized: usize,
        actor: String,
        scaled_at: DateTime<Utc>,
    },
    SwarmKilled {
        swarm_id: SwarmId,
        reason: String,
        forced_removals: usize,
        actor: String,
        killed_at: DateTime<Utc>,
    },
    UtilizationChanged {
        swarm_id: SwarmId,
        busy: usize,
        total: usize,
        utilization: f64,
        changed_at: DateTime<Utc>,
    },
    DecisionRouted {
        swarm_id: SwarmId,
        source: DecisionSource,
        latency_ms: u64,
        routed_at: DateTime<Utc>,
    },
    DecisionUnavailable {
        swarm_id: SwarmId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}

impl SwarmEvent {
    pub fn swarm_id(&self) -> SwarmId {
        match self {
            SwarmEvent::SwarmSpawned { swarm_id, .. }
            | SwarmEvent::SwarmSpawnFailed { swarm_id, .. }
            | SwarmEvent::AgentsAdded { swarm_id, .. }
            | SwarmEvent::AgentFailed { swarm_id, .. }
            | SwarmEvent::AgentRemoved { swarm_id, .. }
            | SwarmEvent::SwarmScaled { swarm_id, .. }
            | SwarmEvent::SwarmKilled { swarm_id, .. }
            | SwarmEvent::UtilizationChanged { swarm_id, .. }
            | SwarmEvent::DecisionRouted { swarm_id, .. }
            | SwarmEvent::DecisionUnavailable { swarm_id, .. } => *swarm_id,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            SwarmEvent::SwarmSpawned { .. } => "swarm.spawned",
            SwarmEvent::SwarmSpawnFailed { .. } => "swarm.spawn_failed",
            SwarmEvent::AgentsAdded { .. } => "agent.added",
            SwarmEvent::AgentFailed { .. } => "agent.failed",
            SwarmEvent::AgentRemoved { .. } => "agent.removed",
            SwarmEvent::SwarmScaled { .. } => "swarm.scaled",
            SwarmEvent::SwarmKilled { .. } => "swarm.killed",
            SwarmEvent::UtilizationChanged { .. } => "swarm.utilization_changed",
            SwarmEvent::DecisionRouted { .. } => "coordinator.decision_routed",
            SwarmEvent::DecisionUnavailable { .. } => "coordinator.decision_unavailable",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SwarmEvent::SwarmSpawned { spawned_at: t, .. }
            | SwarmEvent::SwarmSpawnFailed { failed_at: t, .. }
            | SwarmEvent::AgentsAdded { added_at: t, .. }
            | SwarmEvent::AgentFailed { failed_at: t, .. }
            | SwarmEvent::AgentRemoved { removed_at: t, .. }
            | SwarmEvent::SwarmScaled { scaled_at: t, .. }
            | SwarmEvent::SwarmKilled { killed_at: t, .. }
            | SwarmEvent::UtilizationChanged { changed_at: t, .. }
            | SwarmEvent::DecisionRouted { routed_at: t, .. }
            | SwarmEvent::DecisionUnavailable { failed_at: t, .. } => *t,
        }
    }

    /// Principal that triggered the event; `system` for internally driven ones.
    pub fn actor(&self) -> &str {
        match self {
            SwarmEvent::SwarmSpawned { actor, .. }
            | SwarmEvent::SwarmSpawnFailed { actor, .. }
            | SwarmEvent::AgentsAdded { actor, .. }
            | SwarmEvent::AgentRemoved { actor, .. }
            | SwarmEvent::SwarmScaled { actor, .. }
            | SwarmEvent::SwarmKilled { actor, .. } => actor,
            _ => "system",
        }
    }

    /// Telemetry-only events carry no lifecycle transition and are not audited.
    pub fn is_lifecycle_transition(&self) -> bool {
        !matches!(
            self,
            SwarmEvent::UtilizationChanged { .. } | SwarmEvent::DecisionRouted { .. }
        )
    }

    pub fn severity(&self) -> AuditSeverity {
        match self {
            SwarmEvent::SwarmSpawnFailed { .. }
            | SwarmEvent::AgentFailed { .. }
            | SwarmEvent::DecisionUnavailable { .. } => AuditSeverity::Warning,
            SwarmEvent::AgentRemoved { forced: true, .. } => AuditSeverity::Warning,
            SwarmEvent::SwarmKilled { .. } => AuditSeverity::Notice,
            _ => AuditSeverity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Notice,
    Warning,
}

/// Record handed to the audit sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub category: String,
    pub severity: AuditSeverity,
    pub swarm_id: SwarmId,
    pub action: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub const CATEGORY: &'static str = "swarm-lifecycle";

    /// Audit record for a lifecycle transition, `None` for telemetry events.
    pub fn from_swarm_event(event: &SwarmEvent) -> Option<Self> {
        if !event.is_lifecycle_transition() {
            return None;
        }
        Some(Self {
            category: Self::CATEGORY.to_string(),
            severity: event.severity(),
            swarm_id: event.swarm_id(),
            action: event.action().to_string(),
            actor: event.actor().to_string(),
            timestamp: event.timestamp(),
            metadata: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_event_maps_to_audit_record() {
        let swarm_id = SwarmId::new();
        let event = SwarmEvent::SwarmKilled {
            swarm_id,
            reason: "objective complete".to_string(),
            forced_removals: 1,
            actor: "ops".to_string(),
            killed_at: Utc::now(),
        };

        let audit = AuditEvent::from_swarm_event(&event).unwrap();
        assert_eq!(audit.category, AuditEvent::CATEGORY);
        assert_eq!(audit.swarm_id, swarm_id);
        assert_eq!(audit.action, "swarm.killed");
        assert_eq!(audit.actor, "ops");
        assert_eq!(audit.severity, AuditSeverity::Notice);
        assert_eq!(
            audit.metadata["SwarmKilled"]["reason"],
            serde_json::json!("objective complete")
        );
    }

    #[test]
    fn test_telemetry_is_not_audited() {
        let event = SwarmEvent::UtilizationChanged {
            swarm_id: SwarmId::new(),
            busy: 1,
            total: 2,
            utilization: 0.5,
            changed_at: Utc::now(),
        };
        assert!(AuditEvent::from_swarm_event(&event).is_none());
        assert_eq!(event.actor(), "system");
    }
}
