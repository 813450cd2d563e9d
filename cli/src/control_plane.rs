// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-process control plane
//!
//! Builds a [`SwarmLifecycleManager`] from a [`ControlPlaneConfig`] and
//! restores the registry from the configured state store, so every CLI
//! invocation picks up where the previous one left off.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use swarmforge_core::{
    domain::{
        config::{BackendConfig, ControlPlaneConfig},
        inference::InferenceBackend,
        repository::StateStore,
    },
    infrastructure::{
        audit::TracingAuditSink,
        auth::StaticTokenAuthGate,
        event_bus::EventBus,
        inference::{build_backend, UnavailableBackend},
        runtime::InProcessAgentRuntime,
        state_store::{FileStateStore, InMemoryStateStore},
    },
};
use swarmforge_swarm::{
    spawn_audit_forwarder, AutoScaler, DecisionRouter, LifecycleSettings, ScalePolicy,
    SwarmLifecycleManager,
};

const AUDIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ControlPlane {
    config: ControlPlaneConfig,
    manager: Arc<SwarmLifecycleManager>,
    audit: JoinHandle<()>,
}

impl ControlPlane {
    /// Load, validate and start from an explicit path or the discovery chain.
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = ControlPlaneConfig::load_or_default(config_path)
            .context("Failed to load configuration")?;
        config
            .validate()
            .context("Configuration validation failed")?;
        Self::start(config).await
    }

    pub async fn start(config: ControlPlaneConfig) -> Result<Self> {
        let auth = Arc::new(
            StaticTokenAuthGate::from_config(&config.spec.auth)
                .context("Failed to build auth gate")?,
        );

        let store: Arc<dyn StateStore> = match &config.spec.state.path {
            Some(path) => Arc::new(
                FileStateStore::open(path.clone())
                    .await
                    .with_context(|| format!("Failed to open state file {:?}", path))?,
            ),
            None => {
                debug!("No state path configured, swarm state is kept in memory");
                Arc::new(InMemoryStateStore::new())
            }
        };

        let decision = &config.spec.decision;
        let local = backend_or_unavailable(decision.local.as_ref(), "local")?;
        let fallback = backend_or_unavailable(decision.fallback.as_ref(), "fallback")?;
        let router = Arc::new(DecisionRouter::from_config(decision, local, fallback));

        let events = EventBus::with_default_capacity();
        let audit = spawn_audit_forwarder(&events, Arc::new(TracingAuditSink::new()));

        let manager = Arc::new(SwarmLifecycleManager::new(
            auth,
            store,
            Arc::new(InProcessAgentRuntime::new()),
            router,
            events,
            LifecycleSettings::from_config(&config),
        ));

        let restored = manager
            .restore()
            .await
            .context("Failed to restore swarm state")?;
        info!(restored, "Control plane ready");

        Ok(Self {
            config,
            manager,
            audit,
        })
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<SwarmLifecycleManager> {
        &self.manager
    }

    /// The auto-scaler, when a service token is configured for it.
    pub fn autoscaler(&self) -> Result<Option<Arc<AutoScaler>>> {
        let autoscale = &self.config.spec.autoscale;
        let Some(token) = &autoscale.service_token else {
            return Ok(None);
        };
        let token = match token.strip_prefix("env:") {
            Some(var) => std::env::var(var)
                .with_context(|| format!("Environment variable not set: {}", var))?,
            None => token.clone(),
        };
        Ok(Some(Arc::new(AutoScaler::new(
            Arc::clone(&self.manager),
            ScalePolicy::from_config(autoscale),
            token,
            autoscale.interval,
        ))))
    }

    /// Drop the manager and let the audit forwarder drain pending events.
    pub async fn shutdown(self) {
        let Self { manager, audit, .. } = self;
        drop(manager);
        if tokio::time::timeout(AUDIT_FLUSH_TIMEOUT, audit).await.is_err() {
            warn!("Audit forwarder did not finish within {:?}", AUDIT_FLUSH_TIMEOUT);
        }
    }
}

fn backend_or_unavailable(
    config: Option<&BackendConfig>,
    slot: &str,
) -> Result<Arc<dyn InferenceBackend>> {
    match config {
        Some(config) => build_backend(config)
            .with_context(|| format!("Failed to build {} inference backend", slot)),
        None => {
            debug!(slot, "Inference backend not configured");
            Ok(Arc::new(UnavailableBackend::new(slot)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_core::domain::agent::AgentType;
    use swarmforge_core::domain::config::TokenConfig;
    use swarmforge_core::domain::security::Role;
    use swarmforge_core::domain::swarm::{QueenType, SwarmSpec, SwarmStatus, Topology};

    fn config_with_state(path: PathBuf) -> ControlPlaneConfig {
        let mut config = ControlPlaneConfig::default();
        config.spec.state.path = Some(path);
        config.spec.auth.tokens.push(TokenConfig {
            token: "admin-token".to_string(),
            principal: "admin".to_string(),
            role: Role::Admin,
        });
        config
    }

    fn spec() -> SwarmSpec {
        SwarmSpec {
            objective: "build X".to_string(),
            topology: Topology::Hierarchical,
            queen_type: QueenType::Strategic,
            min_workers: 1,
            max_workers: 4,
            initial_agents: vec![AgentType::GeneralistCoder; 2],
            auto_scale: false,
        }
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let first = ControlPlane::start(config_with_state(path.clone())).await.unwrap();
        let swarm_id = first
            .manager()
            .spawn_swarm("admin-token", spec())
            .await
            .unwrap()
            .swarm
            .id;
        first.shutdown().await;

        let second = ControlPlane::start(config_with_state(path)).await.unwrap();
        let report = second
            .manager()
            .get_swarm_status("admin-token", swarm_id)
            .await
            .unwrap();
        assert_eq!(report.swarm.status, SwarmStatus::Active);
        assert_eq!(report.worker_count, 2);
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_autoscaler_requires_service_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_state(dir.path().join("state.json"));
        let plane = ControlPlane::start(config.clone()).await.unwrap();
        assert!(plane.autoscaler().unwrap().is_none());
        plane.shutdown().await;

        config.spec.autoscale.service_token = Some("scaler-token".to_string());
        let plane = ControlPlane::start(config).await.unwrap();
        assert!(plane.autoscaler().unwrap().is_some());
        plane.shutdown().await;
    }

    #[tokio::test]
    async fn test_unsupported_backend_is_rejected() {
        let mut config = ControlPlaneConfig::default();
        config.spec.decision.local = Some(BackendConfig {
            provider_type: "carrier-pigeon".to_string(),
            endpoint: "http://localhost".to_string(),
            model: "m".to_string(),
            api_key: None,
        });
        assert!(ControlPlane::start(config).await.is_err());
    }
}
