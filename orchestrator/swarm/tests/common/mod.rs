// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures for the swarm integration tests: a scriptable agent
//! runtime, canned reasoning backends and a fully wired lifecycle manager.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swarmforge_core::domain::agent::{Agent, AgentId, AgentStatus, AgentType};
use swarmforge_core::domain::inference::{InferenceBackend, InferenceError, InferenceResponse};
use swarmforge_core::domain::repository::{StateStore, StoreError};
use swarmforge_core::domain::runtime::{AgentRuntime, RuntimeError};
use swarmforge_core::domain::security::Role;
use swarmforge_core::domain::swarm::{QueenType, SwarmId, SwarmSpec, Topology};
use swarmforge_core::infrastructure::auth::StaticTokenAuthGate;
use swarmforge_core::infrastructure::event_bus::EventBus;
use swarmforge_core::infrastructure::state_store::InMemoryStateStore;
use swarmforge_swarm::{DecisionRouter, LifecycleSettings, SwarmLifecycleManager};

pub const ADMIN: &str = "admin-token";
pub const OPERATOR: &str = "operator-token";
pub const VIEWER: &str = "viewer-token";
pub const SCALER: &str = "scaler-token";

/// Agent runtime whose spawn outcome can be scripted per test.
#[derive(Default)]
pub struct ScriptedRuntime {
    fail_next: AtomicUsize,
    always_fail: AtomicBool,
    spawned: Mutex<HashSet<AgentId>>,
    stop_signals: Mutex<Vec<AgentId>>,
    terminated: Mutex<Vec<AgentId>>,
}

impl ScriptedRuntime {
    /// Fail the next `n` spawn calls, then succeed.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn fail_always(&self, on: bool) {
        self.always_fail.store(on, Ordering::SeqCst);
    }

    pub fn running(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }

    pub fn stop_signals(&self) -> Vec<AgentId> {
        self.stop_signals.lock().unwrap().clone()
    }

    pub fn terminated(&self) -> Vec<AgentId> {
        self.terminated.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn spawn(&self, agent: &Agent) -> Result<(), RuntimeError> {
        if self.always_fail.load(Ordering::SeqCst) {
            return Err(RuntimeError::SpawnFailed("scripted failure".to_string()));
        }
        let consumed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(RuntimeError::SpawnFailed("transient failure".to_string()));
        }
        self.spawned.lock().unwrap().insert(agent.id);
        Ok(())
    }

    async fn signal_stop(&self, agent_id: AgentId) -> Result<(), RuntimeError> {
        self.stop_signals.lock().unwrap().push(agent_id);
        Ok(())
    }

    async fn terminate(&self, agent_id: AgentId) -> Result<(), RuntimeError> {
        self.spawned.lock().unwrap().remove(&agent_id);
        self.terminated.lock().unwrap().push(agent_id);
        Ok(())
    }
}

#[derive(Clone)]
pub enum Script {
    Answer(&'static str),
    Fail,
    /// Never returns; only the caller's timeout ends the call.
    Hang,
}

pub struct ScriptedBackend {
    name: &'static str,
    script: Script,
    pub calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(name: &'static str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            script,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &str {
        self.name
    }

    async fn infer(&self, _prompt: &str, _timeout: Duration) -> Result<InferenceResponse, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Answer(text) => Ok(InferenceResponse {
                text: text.to_string(),
                latency_ms: 5,
                confidence: None,
            }),
            Script::Fail => Err(InferenceError::Provider("scripted failure".to_string())),
            Script::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// State store that refuses every write.
pub struct BrokenStore;

#[async_trait]
impl StateStore for BrokenStore {
    async fn put(&self, _: &str, _: serde_json::Value, _: Option<Duration>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk on fire".to_string()))
    }

    async fn get(&self, _: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Err(StoreError::Unavailable("disk on fire".to_string()))
    }

    async fn list(&self, _: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("disk on fire".to_string()))
    }
}

pub fn auth_gate() -> StaticTokenAuthGate {
    StaticTokenAuthGate::new()
        .with_token(ADMIN, "admin", Role::Admin)
        .with_token(OPERATOR, "operator", Role::Operator)
        .with_token(VIEWER, "viewer", Role::Viewer)
        .with_token(SCALER, "autoscaler", Role::Autoscaler)
}

/// Defaults with near-zero spawn backoff so retry tests stay fast.
pub fn fast_settings() -> LifecycleSettings {
    LifecycleSettings {
        spawn_backoff_base: Duration::from_millis(1),
        ..LifecycleSettings::default()
    }
}

pub struct Harness {
    pub manager: Arc<SwarmLifecycleManager>,
    pub runtime: Arc<ScriptedRuntime>,
    pub store: Arc<dyn StateStore>,
    pub events: EventBus,
}

pub struct HarnessBuilder {
    settings: LifecycleSettings,
    store: Arc<dyn StateStore>,
    local: Arc<dyn InferenceBackend>,
    fallback: Arc<dyn InferenceBackend>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            settings: fast_settings(),
            store: Arc::new(InMemoryStateStore::new()),
            local: ScriptedBackend::new("local", Script::Answer("local answer")),
            fallback: ScriptedBackend::new("fallback", Script::Answer("fallback answer")),
        }
    }

    pub fn settings(mut self, settings: LifecycleSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn backends(mut self, local: Arc<dyn InferenceBackend>, fallback: Arc<dyn InferenceBackend>) -> Self {
        self.local = local;
        self.fallback = fallback;
        self
    }

    pub fn build(self) -> Harness {
        let runtime = Arc::new(ScriptedRuntime::default());
        let events = EventBus::new(1024);
        let router = Arc::new(DecisionRouter::new(
            self.local,
            self.fallback,
            Duration::from_millis(5000),
            Duration::from_millis(15000),
        ));
        let manager = Arc::new(SwarmLifecycleManager::new(
            Arc::new(auth_gate()),
            Arc::clone(&self.store),
            runtime.clone(),
            router,
            events.clone(),
            self.settings,
        ));
        Harness {
            manager,
            runtime,
            store: self.store,
            events,
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::new().build()
}

pub fn spec(min_workers: usize, max_workers: usize, initial: &[AgentType]) -> SwarmSpec {
    SwarmSpec {
        objective: "build X".to_string(),
        topology: Topology::Hierarchical,
        queen_type: QueenType::Strategic,
        min_workers,
        max_workers,
        initial_agents: initial.to_vec(),
        auto_scale: false,
    }
}

pub fn coders(n: usize) -> Vec<AgentType> {
    vec![AgentType::GeneralistCoder; n]
}

impl Harness {
    pub async fn spawn(&self, min: usize, max: usize, initial: usize) -> SwarmId {
        self.manager
            .spawn_swarm(ADMIN, spec(min, max, &coders(initial)))
            .await
            .expect("spawn")
            .swarm
            .id
    }

    pub async fn worker_count(&self, swarm_id: SwarmId) -> usize {
        self.manager
            .get_swarm_status(ADMIN, swarm_id)
            .await
            .expect("status")
            .worker_count
    }

    /// Active agent ids, in spawn order.
    pub async fn active_agents(&self, swarm_id: SwarmId) -> Vec<AgentId> {
        self.manager
            .get_swarm_status(ADMIN, swarm_id)
            .await
            .expect("status")
            .agents
            .into_iter()
            .filter(|a| a.status.is_active())
            .map(|a| a.id)
            .collect()
    }

    pub async fn agent_status(&self, swarm_id: SwarmId, agent_id: AgentId) -> AgentStatus {
        self.manager
            .get_swarm_status(ADMIN, swarm_id)
            .await
            .expect("status")
            .agents
            .into_iter()
            .find(|a| a.id == agent_id)
            .expect("agent")
            .status
    }

    pub async fn mark_busy(&self, swarm_id: SwarmId, agent_id: AgentId) {
        self.manager
            .report_agent_status(swarm_id, agent_id, AgentStatus::Busy)
            .await
            .expect("report busy");
    }

    /// Let spawned tasks run until `agent_id` leaves the active pool.
    pub async fn wait_until_draining(&self, swarm_id: SwarmId, agent_id: AgentId) {
        for _ in 0..1000 {
            if self.agent_status(swarm_id, agent_id).await == AgentStatus::Draining {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("agent {} never started draining", agent_id);
    }
}
