// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Registry
//!
//! Process-wide map of [`SwarmHandle`]s plus the global active-swarm counter.
//!
//! ## Locking
//!
//! - Each handle guards its [`SwarmState`] with its own async mutex. Every
//!   change to a swarm's agent list happens under that lock.
//! - The [`ActiveSwarmCounter`] is a lock-free atomic reserved with
//!   compare-and-swap, so the capacity check never waits on a swarm lock.
//! - Waiters that must not hold the lock (drains) subscribe to the handle's
//!   change channel, then re-check state after every notification.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use swarmforge_core::domain::agent::{Agent, AgentId, AgentStatus, AgentType};
use swarmforge_core::domain::coordinator::Coordinator;
use swarmforge_core::domain::health::{SwarmHealth, SwarmStatusReport, UtilizationSnapshot, WorkerCounts};
use swarmforge_core::domain::swarm::{Swarm, SwarmId};
use tokio::sync::{watch, Mutex, MutexGuard};

/// Removed or failed agents kept per swarm for status reports. Older ones are
/// dropped as new ones depart.
pub const RETAINED_DEPARTED_AGENTS: usize = 32;

/// Mutable state of one swarm, guarded by [`SwarmHandle::lock`].
#[derive(Debug, Clone)]
pub struct SwarmState {
    pub swarm: Swarm,
    pub agents: Vec<Agent>,
    /// Draining agents that have reported idle and await finalization.
    pub drained: HashSet<AgentId>,
    /// Position in the default agent-type rotation.
    pub rotation_cursor: usize,
}

impl SwarmState {
    pub fn new(swarm: Swarm) -> Self {
        Self {
            swarm,
            agents: Vec::new(),
            drained: HashSet::new(),
            rotation_cursor: 0,
        }
    }

    pub fn counts(&self) -> WorkerCounts {
        WorkerCounts::tally(&self.agents)
    }

    /// Agents in the active pool (`idle|busy`).
    pub fn worker_count(&self) -> usize {
        self.agents.iter().filter(|a| a.status.is_active()).count()
    }

    pub fn utilization(&self) -> UtilizationSnapshot {
        UtilizationSnapshot::from_counts(&self.counts())
    }

    pub fn agent(&self, agent_id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == agent_id)
    }

    pub fn agent_mut(&mut self, agent_id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id == agent_id)
    }

    /// Drop the oldest removed/failed agents beyond [`RETAINED_DEPARTED_AGENTS`].
    pub fn prune_departed(&mut self) {
        let departed = self.agents.iter().filter(|a| !a.status.is_live()).count();
        let mut excess = departed.saturating_sub(RETAINED_DEPARTED_AGENTS);
        if excess == 0 {
            return;
        }
        self.agents.retain(|a| {
            if excess > 0 && !a.status.is_live() {
                excess -= 1;
                return false;
            }
            true
        });
    }

    pub fn next_default_type(&mut self) -> AgentType {
        let agent_type = AgentType::rotation(self.rotation_cursor);
        self.rotation_cursor = self.rotation_cursor.wrapping_add(1);
        agent_type
    }

    /// Up to `n` active agents to shed, idle ones first.
    pub fn removal_candidates(&self, n: usize) -> Vec<AgentId> {
        let idle = self.agents.iter().filter(|a| a.status == AgentStatus::Idle);
        let busy = self.agents.iter().filter(|a| a.status == AgentStatus::Busy);
        idle.chain(busy).take(n).map(|a| a.id).collect()
    }

    /// A drain is settled once the agent reported idle or left `draining`
    /// through some other path (a concurrent kill, for example).
    pub fn drain_settled(&self, agent_id: AgentId) -> bool {
        self.drained.contains(&agent_id)
            || self
                .agent(agent_id)
                .map_or(true, |a| a.status != AgentStatus::Draining)
    }

    pub fn report(&self, coordinator: &Coordinator) -> SwarmStatusReport {
        let counts = self.counts();
        SwarmStatusReport {
            swarm: self.swarm.clone(),
            counts,
            worker_count: counts.active(),
            utilization: UtilizationSnapshot::from_counts(&counts).utilization,
            decision_source: coordinator.last_source(),
            pending_decisions: coordinator.pending(),
            health: SwarmHealth::classify(&counts, coordinator.is_degraded()),
            agents: self.agents.clone(),
        }
    }
}

/// Registry entry for one swarm.
#[derive(Debug)]
pub struct SwarmHandle {
    id: SwarmId,
    state: Mutex<SwarmState>,
    changes: watch::Sender<u64>,
    coordinator: Arc<Coordinator>,
}

impl SwarmHandle {
    pub fn new(state: SwarmState, coordinator: Arc<Coordinator>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            id: state.swarm.id,
            state: Mutex::new(state),
            changes,
            coordinator,
        }
    }

    pub fn id(&self) -> SwarmId {
        self.id
    }

    pub async fn lock(&self) -> MutexGuard<'_, SwarmState> {
        self.state.lock().await
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Wake everyone waiting on this swarm's state.
    pub fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    /// Subscribe before checking state, so no notification is lost in between.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

/// Global count of swarms in `spawning|active|scaling`.
#[derive(Debug)]
pub struct ActiveSwarmCounter {
    current: AtomicUsize,
    cap: usize,
}

impl ActiveSwarmCounter {
    pub fn new(cap: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            cap,
        }
    }

    /// Take a slot if one is free.
    pub fn try_reserve(&self) -> bool {
        self.current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.cap).then_some(n + 1)
            })
            .is_ok()
    }

    pub fn release(&self) {
        let _ = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Overwrite the count after a restore.
    pub fn reset(&self, n: usize) {
        self.current.store(n, Ordering::Release);
    }
}

pub struct SwarmRegistry {
    swarms: DashMap<SwarmId, Arc<SwarmHandle>>,
    active: ActiveSwarmCounter,
}

impl SwarmRegistry {
    pub fn new(max_active_swarms: usize) -> Self {
        Self {
            swarms: DashMap::new(),
            active: ActiveSwarmCounter::new(max_active_swarms),
        }
    }

    pub fn get(&self, swarm_id: SwarmId) -> Option<Arc<SwarmHandle>> {
        self.swarms.get(&swarm_id).map(|h| Arc::clone(h.value()))
    }

    pub fn insert(&self, handle: Arc<SwarmHandle>) {
        self.swarms.insert(handle.id(), handle);
    }

    pub fn contains(&self, swarm_id: SwarmId) -> bool {
        self.swarms.contains_key(&swarm_id)
    }

    /// Snapshot of every handle. Never hold a map guard across an await.
    pub fn handles(&self) -> Vec<Arc<SwarmHandle>> {
        self.swarms.iter().map(|h| Arc::clone(h.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.swarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swarms.is_empty()
    }

    pub fn active(&self) -> &ActiveSwarmCounter {
        &self.active
    }
}

/// Lightweight listing entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SwarmSummary {
    pub id: SwarmId,
    pub objective: String,
    pub status: swarmforge_core::domain::swarm::SwarmStatus,
    pub worker_count: usize,
    pub min_workers: usize,
    pub max_workers: usize,
    pub auto_scale_enabled: bool,
    pub health: SwarmHealth,
    pub created_at: DateTime<Utc>,
}

impl From<&SwarmStatusReport> for SwarmSummary {
    fn from(report: &SwarmStatusReport) -> Self {
        Self {
            id: report.swarm.id,
            objective: report.swarm.objective.clone(),
            status: report.swarm.status,
            worker_count: report.worker_count,
            min_workers: report.swarm.min_workers,
            max_workers: report.swarm.max_workers,
            auto_scale_enabled: report.swarm.auto_scale_enabled,
            health: report.health,
            created_at: report.swarm.created_at,
        }
    }
}
