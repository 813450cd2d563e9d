// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Lifecycle Manager
//!
//! Owns the [`SwarmRegistry`] and exposes the public operation set. Every
//! operation follows the same path:
//!
//! 1. validate the caller's token through the [`AuthGate`]
//! 2. mutate the swarm under its handle lock
//! 3. persist a [`SwarmSnapshot`] (bounded by the store write timeout)
//! 4. publish a [`SwarmEvent`] on the event bus
//!
//! Drains release the swarm lock while they wait, so the task executor can
//! keep reporting agent status, and re-acquire it to finalize removal.
//! State store failures are logged and never fail the operation.

use crate::domain::registry::{SwarmHandle, SwarmRegistry, SwarmState, SwarmSummary};
use crate::domain::snapshot::SwarmSnapshot;
use crate::application::decision::DecisionRouter;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use swarmforge_core::domain::agent::{Agent, AgentId, AgentStatus, AgentType};
use swarmforge_core::domain::config::ControlPlaneConfig;
use swarmforge_core::domain::coordinator::{Coordinator, Decision};
use swarmforge_core::domain::error::SwarmError;
use swarmforge_core::domain::events::SwarmEvent;
use swarmforge_core::domain::health::{SwarmStatusReport, UtilizationSnapshot};
use swarmforge_core::domain::repository::{
    is_swarm_state_key, swarm_state_key, StateStore, StoreError, SWARM_KEY_PREFIX,
};
use swarmforge_core::domain::runtime::AgentRuntime;
use swarmforge_core::domain::security::{AuthGate, AuthGrant, Permission};
use swarmforge_core::domain::swarm::{Swarm, SwarmId, SwarmSpec, SwarmStatus};
use swarmforge_core::infrastructure::event_bus::EventBus;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Tunables for the lifecycle manager, normally derived from
/// [`ControlPlaneConfig`].
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub max_active_swarms: usize,
    pub spawn_max_retries: u32,
    pub spawn_backoff_base: Duration,
    pub spawn_timeout: Duration,
    pub drain_timeout: Duration,
    pub kill_timeout: Duration,
    pub store_write_timeout: Duration,
    pub terminated_ttl: Duration,
    pub max_in_flight_decisions: usize,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self::from_config(&ControlPlaneConfig::default())
    }
}

impl LifecycleSettings {
    pub fn from_config(config: &ControlPlaneConfig) -> Self {
        let spec = &config.spec;
        Self {
            max_active_swarms: spec.capacity.max_active_swarms,
            spawn_max_retries: spec.spawn.max_retries,
            spawn_backoff_base: spec.spawn.backoff_base,
            spawn_timeout: spec.spawn.timeout,
            drain_timeout: spec.drain.drain_timeout,
            kill_timeout: spec.drain.kill_timeout,
            store_write_timeout: spec.state.write_timeout,
            terminated_ttl: spec.state.terminated_ttl,
            max_in_flight_decisions: spec.decision.max_in_flight,
        }
    }
}

/// How `remove_agent_from_swarm` got rid of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalMode {
    /// Agent was idle and released at once.
    Immediate,
    /// Busy agent finished its work within the drain timeout.
    Drained,
    /// Drain timeout elapsed and the agent was terminated.
    Forced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedAgent {
    pub agent_id: AgentId,
    pub mode: RemovalMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleOutcome {
    pub swarm_id: SwarmId,
    pub previous: usize,
    pub requested: usize,
    /// `requested` clamped into `[min_workers, max_workers]`.
    pub target: usize,
    /// Worker count once the operation settled.
    pub realized: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillOutcome {
    pub swarm_id: SwarmId,
    /// The swarm was already terminated; nothing was done.
    pub already_terminated: bool,
    pub graceful_removals: usize,
    pub forced_removals: usize,
}

pub struct SwarmLifecycleManager {
    registry: Arc<SwarmRegistry>,
    auth: Arc<dyn AuthGate>,
    store: Arc<dyn StateStore>,
    runtime: Arc<dyn AgentRuntime>,
    router: Arc<DecisionRouter>,
    events: EventBus,
    settings: LifecycleSettings,
}

impl SwarmLifecycleManager {
    pub fn new(
        auth: Arc<dyn AuthGate>,
        store: Arc<dyn StateStore>,
        runtime: Arc<dyn AgentRuntime>,
        router: Arc<DecisionRouter>,
        events: EventBus,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            registry: Arc::new(SwarmRegistry::new(settings.max_active_swarms)),
            auth,
            store,
            runtime,
            router,
            events,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SwarmRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    // ---------------------------------------------------------------------
    // Public operations
    // ---------------------------------------------------------------------

    pub async fn spawn_swarm(
        &self,
        token: &str,
        spec: SwarmSpec,
    ) -> Result<SwarmStatusReport, SwarmError> {
        let grant = self.authorize(token, Permission::Spawn).await?;
        spec.validate()?;

        if !self.registry.active().try_reserve() {
            return Err(SwarmError::CapacityExceeded(format!(
                "{} of {} swarms already active",
                self.registry.active().current(),
                self.registry.active().cap()
            )));
        }

        let swarm = Swarm::new(&spec);
        let swarm_id = swarm.id;
        let coordinator = Arc::new(Coordinator::new(
            swarm_id,
            self.settings.max_in_flight_decisions,
        ));
        let handle = Arc::new(SwarmHandle::new(SwarmState::new(swarm), coordinator));
        let mut guard = SpawnGuard {
            handle: Arc::clone(&handle),
            registry: Arc::clone(&self.registry),
            runtime: Arc::clone(&self.runtime),
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
            armed: true,
        };
        let mut state = handle.lock().await;
        self.registry.insert(Arc::clone(&handle));

        let mut batch = spec.initial_agents.clone();
        while batch.len() < spec.min_workers {
            batch.push(state.next_default_type());
        }
        info!(
            swarm_id = %swarm_id,
            objective = %state.swarm.objective,
            agents = batch.len(),
            "Spawning swarm"
        );

        let spawned = self.spawn_batch(swarm_id, &batch).await;
        let started = spawned.iter().filter(|a| a.status.is_active()).count();
        state.agents.extend(spawned);

        if (!batch.is_empty() && started == 0) || started < spec.min_workers {
            let reason = format!(
                "{} of {} agents started, {} required",
                started,
                batch.len(),
                spec.min_workers.max(1)
            );
            retire_spawning(&mut state, self.runtime.as_ref()).await?;
            handle.coordinator().reject_new();
            self.registry.active().release();
            guard.disarm();
            self.record_active_gauge();
            self.persist(&state).await;
            drop(state);

            warn!(swarm_id = %swarm_id, "Swarm spawn failed: {}", reason);
            self.events.publish(SwarmEvent::SwarmSpawnFailed {
                swarm_id,
                reason: reason.clone(),
                actor: grant.principal,
                failed_at: Utc::now(),
            });
            return Err(SwarmError::SpawnFailed(reason));
        }

        state.swarm.transition(SwarmStatus::Active)?;
        guard.disarm();
        self.record_active_gauge();
        self.persist(&state).await;
        let report = state.report(handle.coordinator());
        drop(state);

        info!(swarm_id = %swarm_id, workers = report.worker_count, "Swarm active");
        self.events.publish(SwarmEvent::SwarmSpawned {
            swarm_id,
            objective: report.swarm.objective.clone(),
            worker_count: report.worker_count,
            auto_scale: report.swarm.auto_scale_enabled,
            actor: grant.principal,
            spawned_at: Utc::now(),
        });
        Ok(report)
    }

    pub async fn add_agent_to_swarm(
        &self,
        token: &str,
        swarm_id: SwarmId,
        agent_type: AgentType,
        count: usize,
    ) -> Result<Vec<Agent>, SwarmError> {
        let grant = self.authorize(token, Permission::AddAgent).await?;
        if count == 0 {
            return Err(SwarmError::InvalidConfig("count must be at least 1".to_string()));
        }

        let handle = self.handle(swarm_id)?;
        let mut state = handle.lock().await;
        ensure_mutable(&state, "add_agent")?;

        let worker_count = state.worker_count();
        if worker_count + count > state.swarm.max_workers {
            return Err(SwarmError::CapacityExceeded(format!(
                "swarm {} has {} of {} workers, cannot add {}",
                swarm_id, worker_count, state.swarm.max_workers, count
            )));
        }

        let batch = vec![agent_type; count];
        let spawned = self.spawn_batch(swarm_id, &batch).await;
        let started: Vec<Agent> = spawned
            .iter()
            .filter(|a| a.status.is_active())
            .cloned()
            .collect();
        let failed = spawned.len() - started.len();
        state.agents.extend(spawned);
        state.prune_departed();
        self.persist(&state).await;
        drop(state);
        handle.notify();

        if started.is_empty() {
            return Err(SwarmError::SpawnFailed(format!(
                "none of {} {} agents started",
                count, agent_type
            )));
        }

        info!(
            swarm_id = %swarm_id,
            agent_type = %agent_type,
            started = started.len(),
            failed,
            "Agents added"
        );
        self.events.publish(SwarmEvent::AgentsAdded {
            swarm_id,
            agent_type,
            agent_ids: started.iter().map(|a| a.id).collect(),
            failed,
            actor: grant.principal,
            added_at: Utc::now(),
        });
        Ok(started)
    }

    pub async fn remove_agent_from_swarm(
        &self,
        token: &str,
        swarm_id: SwarmId,
        agent_id: AgentId,
    ) -> Result<RemovedAgent, SwarmError> {
        let grant = self.authorize(token, Permission::RemoveAgent).await?;
        let handle = self.handle(swarm_id)?;
        let mut state = handle.lock().await;
        ensure_mutable(&state, "remove_agent")?;

        let status = match state.agent(agent_id) {
            Some(agent) if agent.status.is_active() => agent.status,
            _ => return Err(SwarmError::AgentNotFound { swarm_id, agent_id }),
        };

        let remaining = state.worker_count() - 1;
        if remaining < state.swarm.min_workers {
            return Err(SwarmError::MinWorkersViolation {
                swarm_id,
                min_workers: state.swarm.min_workers,
                remaining,
            });
        }

        if status == AgentStatus::Idle {
            self.release_agent(&mut state, agent_id, false, &grant.principal)
                .await;
            self.persist(&state).await;
            drop(state);
            handle.notify();
            return Ok(RemovedAgent {
                agent_id,
                mode: RemovalMode::Immediate,
            });
        }

        self.begin_drain(&mut state, agent_id).await;
        self.persist(&state).await;
        drop(state);
        handle.notify();

        self.wait_for_drain(&handle, &[agent_id], self.settings.drain_timeout)
            .await;

        let mut state = handle.lock().await;
        let finished = self
            .finalize_drains(&mut state, &[agent_id], &grant.principal)
            .await;
        self.persist(&state).await;
        drop(state);
        handle.notify();

        // Absent from `finished` means a concurrent kill already released it
        let mode = match finished.first() {
            Some((_, true)) => RemovalMode::Drained,
            _ => RemovalMode::Forced,
        };
        Ok(RemovedAgent { agent_id, mode })
    }

    pub async fn scale_swarm(
        &self,
        token: &str,
        swarm_id: SwarmId,
        target_workers: usize,
    ) -> Result<ScaleOutcome, SwarmError> {
        let grant = self.authorize(token, Permission::Scale).await?;
        let handle = self.handle(swarm_id)?;
        let mut state = handle.lock().await;
        if state.swarm.status != SwarmStatus::Active {
            return Err(SwarmError::InvalidState {
                swarm_id,
                status: state.swarm.status,
                operation: "scale",
            });
        }

        let previous = state.worker_count();
        let target = state.swarm.clamp_target(target_workers);
        let mut outcome = ScaleOutcome {
            swarm_id,
            previous,
            requested: target_workers,
            target,
            realized: previous,
        };
        if target == previous {
            debug!(swarm_id = %swarm_id, workers = previous, "Scale target already met");
            return Ok(outcome);
        }

        state.swarm.transition(SwarmStatus::Scaling)?;
        info!(swarm_id = %swarm_id, from = previous, to = target, "Scaling swarm");

        if target > previous {
            let batch: Vec<AgentType> = (0..target - previous)
                .map(|_| state.next_default_type())
                .collect();
            let spawned = self.spawn_batch(swarm_id, &batch).await;
            state.agents.extend(spawned);
            state.prune_departed();
            metrics::counter!("swarmforge_scale_actions_total", "direction" => "up").increment(1);
        } else {
            let candidates = state.removal_candidates(previous - target);
            let mut draining = Vec::new();
            for agent_id in candidates {
                let idle = state
                    .agent(agent_id)
                    .is_some_and(|a| a.status == AgentStatus::Idle);
                if idle {
                    self.release_agent(&mut state, agent_id, false, &grant.principal)
                        .await;
                } else {
                    self.begin_drain(&mut state, agent_id).await;
                    draining.push(agent_id);
                }
            }
            metrics::counter!("swarmforge_scale_actions_total", "direction" => "down").increment(1);

            if !draining.is_empty() {
                self.persist(&state).await;
                drop(state);
                handle.notify();
                self.wait_for_drain(&handle, &draining, self.settings.drain_timeout)
                    .await;
                state = handle.lock().await;
                self.finalize_drains(&mut state, &draining, &grant.principal)
                    .await;
            }
        }

        // A kill may have taken over while the lock was released
        if state.swarm.status == SwarmStatus::Scaling {
            state.swarm.transition(SwarmStatus::Active)?;
        }
        outcome.realized = state.worker_count();
        self.persist(&state).await;
        drop(state);
        handle.notify();

        self.events.publish(SwarmEvent::SwarmScaled {
            swarm_id,
            from: previous,
            requested: target_workers,
            realized: outcome.realized,
            actor: grant.principal,
            scaled_at: Utc::now(),
        });
        Ok(outcome)
    }

    pub async fn get_swarm_status(
        &self,
        token: &str,
        swarm_id: SwarmId,
    ) -> Result<SwarmStatusReport, SwarmError> {
        self.authorize(token, Permission::ReadStatus).await?;
        let handle = self.handle(swarm_id)?;
        let state = handle.lock().await;
        Ok(state.report(handle.coordinator()))
    }

    /// Every known swarm, oldest first.
    pub async fn list_swarms(&self, token: &str) -> Result<Vec<SwarmSummary>, SwarmError> {
        self.authorize(token, Permission::ReadStatus).await?;
        let mut summaries = Vec::new();
        for handle in self.registry.handles() {
            let state = handle.lock().await;
            summaries.push(SwarmSummary::from(&state.report(handle.coordinator())));
        }
        summaries.sort_by_key(|s| s.created_at);
        Ok(summaries)
    }

    pub async fn kill_swarm(
        &self,
        token: &str,
        swarm_id: SwarmId,
        reason: &str,
    ) -> Result<KillOutcome, SwarmError> {
        let grant = self.authorize(token, Permission::Kill).await?;
        let handle = self.handle(swarm_id)?;
        let mut state = handle.lock().await;

        match state.swarm.status {
            SwarmStatus::Terminated => {
                debug!(swarm_id = %swarm_id, "Kill on terminated swarm is a no-op");
                return Ok(KillOutcome {
                    swarm_id,
                    already_terminated: true,
                    graceful_removals: 0,
                    forced_removals: 0,
                });
            }
            SwarmStatus::Draining => {
                return Err(SwarmError::InvalidState {
                    swarm_id,
                    status: SwarmStatus::Draining,
                    operation: "kill",
                });
            }
            // Never became active, so there is no work to drain
            SwarmStatus::Spawning => {
                let released = retire_spawning(&mut state, self.runtime.as_ref()).await?;
                handle.coordinator().reject_new();
                self.registry.active().release();
                self.record_active_gauge();
                self.persist(&state).await;
                drop(state);
                handle.notify();

                info!(swarm_id = %swarm_id, reason, released, "Killed swarm before it became active");
                self.events.publish(SwarmEvent::SwarmKilled {
                    swarm_id,
                    reason: reason.to_string(),
                    forced_removals: 0,
                    actor: grant.principal,
                    killed_at: Utc::now(),
                });
                return Ok(KillOutcome {
                    swarm_id,
                    already_terminated: false,
                    graceful_removals: released,
                    forced_removals: 0,
                });
            }
            SwarmStatus::Active | SwarmStatus::Scaling => {}
        }

        state.swarm.transition(SwarmStatus::Draining)?;
        handle.coordinator().reject_new();
        info!(swarm_id = %swarm_id, reason, "Killing swarm");

        let mut graceful_removals = 0;
        let mut draining = Vec::new();
        let live: Vec<(AgentId, AgentStatus)> = state
            .agents
            .iter()
            .filter(|a| a.status.is_live())
            .map(|a| (a.id, a.status))
            .collect();
        for (agent_id, status) in live {
            match status {
                AgentStatus::Idle => {
                    self.release_agent(&mut state, agent_id, false, &grant.principal)
                        .await;
                    graceful_removals += 1;
                }
                AgentStatus::Busy => {
                    self.begin_drain(&mut state, agent_id).await;
                    draining.push(agent_id);
                }
                _ => draining.push(agent_id),
            }
        }
        self.persist(&state).await;
        drop(state);
        handle.notify();

        if !draining.is_empty() {
            self.wait_for_drain(&handle, &draining, self.settings.kill_timeout)
                .await;
        }

        let mut state = handle.lock().await;
        let finished = self
            .finalize_drains(&mut state, &draining, &grant.principal)
            .await;
        let drained = finished.iter().filter(|(_, graceful)| *graceful).count();
        graceful_removals += drained;
        let forced_removals = finished.len() - drained;

        state.swarm.transition(SwarmStatus::Terminated)?;
        self.registry.active().release();
        self.record_active_gauge();
        self.persist(&state).await;
        drop(state);
        handle.notify();

        info!(
            swarm_id = %swarm_id,
            graceful = graceful_removals,
            forced = forced_removals,
            "Swarm terminated"
        );
        self.events.publish(SwarmEvent::SwarmKilled {
            swarm_id,
            reason: reason.to_string(),
            forced_removals,
            actor: grant.principal,
            killed_at: Utc::now(),
        });
        Ok(KillOutcome {
            swarm_id,
            already_terminated: false,
            graceful_removals,
            forced_removals,
        })
    }

    /// Ask the swarm's coordinator for a decision. A kill that lands while the
    /// request is in flight does not cancel it; the answer is returned but not
    /// recorded on the retired coordinator.
    pub async fn query_decision(
        &self,
        swarm_id: SwarmId,
        prompt: &str,
        local_timeout: Option<Duration>,
    ) -> Result<Decision, SwarmError> {
        let handle = self.handle(swarm_id)?;
        let coordinator = Arc::clone(handle.coordinator());
        let _pending = coordinator.try_begin()?;

        match self.router.route(swarm_id, prompt, local_timeout).await {
            Ok(decision) => {
                if coordinator.is_accepting() {
                    coordinator.record(decision.source);
                }
                self.events.publish(SwarmEvent::DecisionRouted {
                    swarm_id,
                    source: decision.source,
                    latency_ms: decision.latency_ms,
                    routed_at: decision.decided_at,
                });
                Ok(decision)
            }
            Err(e) => {
                coordinator.record_unavailable();
                self.events.publish(SwarmEvent::DecisionUnavailable {
                    swarm_id,
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// Record an `idle`/`busy` transition reported by the task executor. An
    /// idle report from a draining agent acknowledges its drain.
    pub async fn report_agent_status(
        &self,
        swarm_id: SwarmId,
        agent_id: AgentId,
        status: AgentStatus,
    ) -> Result<UtilizationSnapshot, SwarmError> {
        if !status.is_active() {
            return Err(SwarmError::InvalidConfig(format!(
                "agents may only report idle or busy, not {}",
                status
            )));
        }

        let handle = self.handle(swarm_id)?;
        let mut state = handle.lock().await;
        let current = match state.agent(agent_id) {
            Some(agent) if agent.status.is_live() => agent.status,
            _ => return Err(SwarmError::AgentNotFound { swarm_id, agent_id }),
        };

        if current == AgentStatus::Draining {
            if status == AgentStatus::Idle {
                state.drained.insert(agent_id);
            }
        } else if let Some(agent) = state.agent_mut(agent_id) {
            agent.status = status;
        }

        let snapshot = state.utilization();
        self.persist(&state).await;
        drop(state);
        handle.notify();

        self.events.publish(SwarmEvent::UtilizationChanged {
            swarm_id,
            busy: snapshot.busy,
            total: snapshot.total,
            utilization: snapshot.utilization,
            changed_at: Utc::now(),
        });
        Ok(snapshot)
    }

    /// Rebuild the registry from the state store and recompute the global
    /// counter. Swarms already in the registry are left alone. Returns the
    /// number of swarms restored.
    pub async fn restore(&self) -> Result<usize, StoreError> {
        let keys = self.store.list(SWARM_KEY_PREFIX).await?;
        let mut restored = 0;

        for key in keys.iter().filter(|k| is_swarm_state_key(k)) {
            let Some(value) = self.store.get(key).await? else {
                continue;
            };
            let snapshot: SwarmSnapshot = match serde_json::from_value(value) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(key = %key, "Skipping unreadable swarm snapshot: {}", e);
                    continue;
                }
            };
            if self.registry.contains(snapshot.swarm.id) {
                continue;
            }

            let (state, changed) = snapshot.recover();
            let coordinator = Arc::new(Coordinator::new(
                state.swarm.id,
                self.settings.max_in_flight_decisions,
            ));
            if !state.swarm.status.accepts_mutations() {
                coordinator.reject_new();
            }
            if changed {
                info!(
                    swarm_id = %state.swarm.id,
                    status = %state.swarm.status,
                    "Normalized interrupted swarm on restore"
                );
                self.persist(&state).await;
            }
            self.registry
                .insert(Arc::new(SwarmHandle::new(state, coordinator)));
            restored += 1;
        }

        let mut occupying = 0;
        for handle in self.registry.handles() {
            if handle.lock().await.swarm.status.occupies_capacity() {
                occupying += 1;
            }
        }
        self.registry.active().reset(occupying);
        self.record_active_gauge();

        info!(restored, active = occupying, "Registry restored from state store");
        Ok(restored)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    async fn authorize(&self, token: &str, permission: Permission) -> Result<AuthGrant, SwarmError> {
        let grant = self.auth.validate(token).await;
        if let Err(e) = grant.require(permission) {
            warn!(principal = %grant.principal, permission = %permission, "Permission denied");
            return Err(e);
        }
        Ok(grant)
    }

    fn handle(&self, swarm_id: SwarmId) -> Result<Arc<SwarmHandle>, SwarmError> {
        self.registry
            .get(swarm_id)
            .ok_or(SwarmError::SwarmNotFound(swarm_id))
    }

    async fn spawn_batch(&self, swarm_id: SwarmId, batch: &[AgentType]) -> Vec<Agent> {
        join_all(
            batch
                .iter()
                .map(|agent_type| self.spawn_agent(swarm_id, *agent_type)),
        )
        .await
    }

    /// Start one agent with bounded retries. Returns it `idle` on success or
    /// `failed` once every attempt is spent.
    async fn spawn_agent(&self, swarm_id: SwarmId, agent_type: AgentType) -> Agent {
        let mut agent = Agent::new(swarm_id, agent_type);
        let attempts = self.settings.spawn_max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            agent.spawn_attempts = attempt;
            match timeout(self.settings.spawn_timeout, self.runtime.spawn(&agent)).await {
                Ok(Ok(())) => {
                    metrics::counter!("swarmforge_agents_spawned_total").increment(1);
                    return agent;
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!("spawn timed out after {:?}", self.settings.spawn_timeout);
                    // The worker may have come up after the deadline
                    if let Err(e) = self.runtime.terminate(agent.id).await {
                        warn!(agent_id = %agent.id, "Failed to release timed-out worker: {}", e);
                    }
                }
            }

            if attempt < attempts {
                let backoff = self
                    .settings
                    .spawn_backoff_base
                    .saturating_mul(2u32.saturating_pow(attempt - 1));
                warn!(
                    agent_id = %agent.id,
                    attempt,
                    "Agent spawn failed ({}), retrying in {:?}",
                    last_error,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }
        }

        agent.mark_failed();
        metrics::counter!("swarmforge_agent_spawn_failures_total").increment(1);
        warn!(agent_id = %agent.id, attempts, "Agent spawn exhausted retries: {}", last_error);
        self.events.publish(SwarmEvent::AgentFailed {
            swarm_id,
            agent_id: agent.id,
            attempts,
            reason: last_error,
            failed_at: Utc::now(),
        });
        agent
    }

    /// Terminate and mark removed. Caller holds the swarm lock.
    async fn release_agent(
        &self,
        state: &mut SwarmState,
        agent_id: AgentId,
        forced: bool,
        actor: &str,
    ) {
        if let Err(e) = self.runtime.terminate(agent_id).await {
            warn!(agent_id = %agent_id, "Failed to release worker: {}", e);
        }
        state.drained.remove(&agent_id);
        if let Some(agent) = state.agent_mut(agent_id) {
            agent.mark_removed();
        }
        state.prune_departed();
        self.events.publish(SwarmEvent::AgentRemoved {
            swarm_id: state.swarm.id,
            agent_id,
            forced,
            actor: actor.to_string(),
            removed_at: Utc::now(),
        });
    }

    /// Move a busy agent out of the active pool and ask it to wind down.
    async fn begin_drain(&self, state: &mut SwarmState, agent_id: AgentId) {
        if let Some(agent) = state.agent_mut(agent_id) {
            agent.status = AgentStatus::Draining;
        }
        if let Err(e) = self.runtime.signal_stop(agent_id).await {
            warn!(agent_id = %agent_id, "Graceful-stop signal failed: {}", e);
        }
        debug!(agent_id = %agent_id, "Draining agent");
    }

    /// Wait, without holding the lock, until every agent in `agent_ids` has
    /// settled or `deadline` elapses.
    async fn wait_for_drain(&self, handle: &SwarmHandle, agent_ids: &[AgentId], deadline: Duration) {
        let mut changes = handle.subscribe();
        let settled = timeout(deadline, async {
            loop {
                {
                    let state = handle.lock().await;
                    if agent_ids.iter().all(|id| state.drain_settled(*id)) {
                        return;
                    }
                }
                if changes.changed().await.is_err() {
                    return;
                }
            }
        })
        .await;

        if settled.is_err() {
            warn!(
                swarm_id = %handle.id(),
                agents = agent_ids.len(),
                "Drain timeout elapsed after {:?}, forcing removal",
                deadline
            );
        }
    }

    /// Remove every still-draining agent in `agent_ids`. Returns
    /// `(agent, graceful)` for each agent this call removed.
    async fn finalize_drains(
        &self,
        state: &mut SwarmState,
        agent_ids: &[AgentId],
        actor: &str,
    ) -> Vec<(AgentId, bool)> {
        let mut finished = Vec::new();
        for agent_id in agent_ids {
            let still_draining = state
                .agent(*agent_id)
                .is_some_and(|a| a.status == AgentStatus::Draining);
            if !still_draining {
                continue;
            }
            let graceful = state.drained.contains(agent_id);
            self.release_agent(state, *agent_id, !graceful, actor).await;
            finished.push((*agent_id, graceful));
        }
        finished
    }

    async fn persist(&self, state: &SwarmState) {
        write_snapshot(self.store.as_ref(), state, &self.settings).await;
    }

    fn record_active_gauge(&self) {
        metrics::gauge!("swarmforge_active_swarms").set(self.registry.active().current() as f64);
    }
}

async fn write_snapshot(store: &dyn StateStore, state: &SwarmState, settings: &LifecycleSettings) {
    let snapshot = SwarmSnapshot::capture(state);
    let value = match serde_json::to_value(&snapshot) {
        Ok(value) => value,
        Err(e) => {
            warn!(swarm_id = %state.swarm.id, "Failed to serialize swarm snapshot: {}", e);
            return;
        }
    };
    let ttl = (state.swarm.status == SwarmStatus::Terminated).then_some(settings.terminated_ttl);
    let key = swarm_state_key(state.swarm.id);

    match timeout(settings.store_write_timeout, store.put(&key, value, ttl)).await {
        Ok(Ok(())) => debug!(key = %key, "Persisted swarm snapshot"),
        Ok(Err(e)) => warn!(key = %key, "State store write failed: {}", e),
        Err(_) => warn!(
            key = %key,
            "State store write timed out after {:?}",
            settings.store_write_timeout
        ),
    }
}

/// Release every live worker of a `spawning` swarm and mark it terminated.
/// Returns how many workers were released. Caller holds the swarm lock and
/// gives back the capacity slot.
async fn retire_spawning(
    state: &mut SwarmState,
    runtime: &dyn AgentRuntime,
) -> Result<usize, SwarmError> {
    let mut released = 0;
    for agent in state.agents.iter_mut().filter(|a| a.status.is_live()) {
        if let Err(e) = runtime.terminate(agent.id).await {
            warn!(agent_id = %agent.id, "Failed to release worker: {}", e);
        }
        agent.mark_removed();
        released += 1;
    }
    state.drained.clear();
    state.swarm.transition(SwarmStatus::Terminated)?;
    Ok(released)
}

/// Armed while `spawn_swarm` holds a capacity slot for a swarm that is still
/// `spawning`. If the call is dropped before it settles, the swarm is retired
/// on a background task and the slot is given back.
struct SpawnGuard {
    handle: Arc<SwarmHandle>,
    registry: Arc<SwarmRegistry>,
    runtime: Arc<dyn AgentRuntime>,
    store: Arc<dyn StateStore>,
    settings: LifecycleSettings,
    armed: bool,
}

impl SpawnGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SpawnGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let swarm_id = self.handle.id();
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            warn!(swarm_id = %swarm_id, "No runtime left to retire abandoned swarm spawn");
            return;
        };

        let handle = Arc::clone(&self.handle);
        let registry = Arc::clone(&self.registry);
        let runtime = Arc::clone(&self.runtime);
        let store = Arc::clone(&self.store);
        let settings = self.settings.clone();
        rt.spawn(async move {
            let mut state = handle.lock().await;
            // A kill may have retired it first
            if state.swarm.status != SwarmStatus::Spawning {
                return;
            }
            let released = match retire_spawning(&mut state, runtime.as_ref()).await {
                Ok(released) => released,
                Err(e) => {
                    warn!(swarm_id = %swarm_id, "Failed to retire abandoned swarm: {}", e);
                    return;
                }
            };
            handle.coordinator().reject_new();
            registry.active().release();
            metrics::gauge!("swarmforge_active_swarms").set(registry.active().current() as f64);
            write_snapshot(store.as_ref(), &state, &settings).await;
            drop(state);
            handle.notify();
            warn!(swarm_id = %swarm_id, released, "Spawn abandoned by caller, swarm terminated");
        });
    }
}

fn ensure_mutable(state: &SwarmState, operation: &'static str) -> Result<(), SwarmError> {
    if state.swarm.status.accepts_mutations() {
        Ok(())
    } else {
        Err(SwarmError::InvalidState {
            swarm_id: state.swarm.id,
            status: state.swarm.status,
            operation,
        })
    }
}
