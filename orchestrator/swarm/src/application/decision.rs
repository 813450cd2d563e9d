// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Router
//!
//! Sends a coordinator's reasoning request to the local inference backend
//! first and falls back to the remote backend when the local call errors or
//! exceeds its timeout. Each backend call is bounded independently, so the
//! worst case is `local_timeout + fallback_timeout`.
//!
//! | Outcome | Result |
//! |---------|--------|
//! | local succeeds | `Decision { source: local-inference }` |
//! | local fails, fallback succeeds | `Decision { source: fallback }` |
//! | both fail | `SwarmError::DecisionUnavailable` |

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use swarmforge_core::domain::config::DecisionConfig;
use swarmforge_core::domain::coordinator::{Decision, DecisionSource};
use swarmforge_core::domain::error::SwarmError;
use swarmforge_core::domain::inference::{InferenceBackend, InferenceError, InferenceResponse};
use swarmforge_core::domain::swarm::SwarmId;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

pub const DEFAULT_LOCAL_CONFIDENCE: f64 = 0.8;
pub const DEFAULT_FALLBACK_CONFIDENCE: f64 = 0.6;

pub struct DecisionRouter {
    local: Arc<dyn InferenceBackend>,
    fallback: Arc<dyn InferenceBackend>,
    local_timeout: Duration,
    fallback_timeout: Duration,
}

impl DecisionRouter {
    pub fn new(
        local: Arc<dyn InferenceBackend>,
        fallback: Arc<dyn InferenceBackend>,
        local_timeout: Duration,
        fallback_timeout: Duration,
    ) -> Self {
        Self {
            local,
            fallback,
            local_timeout,
            fallback_timeout,
        }
    }

    pub fn from_config(
        config: &DecisionConfig,
        local: Arc<dyn InferenceBackend>,
        fallback: Arc<dyn InferenceBackend>,
    ) -> Self {
        Self::new(local, fallback, config.local_timeout, config.fallback_timeout)
    }

    pub fn local_timeout(&self) -> Duration {
        self.local_timeout
    }

    /// Route one request. `local_timeout` overrides the configured default.
    pub async fn route(
        &self,
        swarm_id: SwarmId,
        prompt: &str,
        local_timeout: Option<Duration>,
    ) -> Result<Decision, SwarmError> {
        let local_timeout = local_timeout.unwrap_or(self.local_timeout);

        let local_error = match call(self.local.as_ref(), prompt, local_timeout).await {
            Ok(response) => {
                return Ok(tag(swarm_id, response, DecisionSource::LocalInference));
            }
            Err(e) => e,
        };
        warn!(
            swarm_id = %swarm_id,
            backend = self.local.name(),
            error = %local_error,
            "Local inference failed, routing to fallback"
        );

        match call(self.fallback.as_ref(), prompt, self.fallback_timeout).await {
            Ok(response) => Ok(tag(swarm_id, response, DecisionSource::Fallback)),
            Err(fallback_error) => {
                warn!(
                    swarm_id = %swarm_id,
                    backend = self.fallback.name(),
                    error = %fallback_error,
                    "Fallback reasoning failed"
                );
                Err(SwarmError::DecisionUnavailable(format!(
                    "local: {}; fallback: {}",
                    local_error, fallback_error
                )))
            }
        }
    }
}

async fn call(
    backend: &dyn InferenceBackend,
    prompt: &str,
    limit: Duration,
) -> Result<InferenceResponse, InferenceError> {
    let started = Instant::now();
    let mut response = timeout(limit, backend.infer(prompt, limit))
        .await
        .map_err(|_| InferenceError::Timeout(limit))??;
    if response.latency_ms == 0 {
        response.latency_ms = started.elapsed().as_millis() as u64;
    }
    debug!(backend = backend.name(), latency_ms = response.latency_ms, "Backend answered");
    Ok(response)
}

fn tag(swarm_id: SwarmId, response: InferenceResponse, source: DecisionSource) -> Decision {
    let default_confidence = match source {
        DecisionSource::LocalInference => DEFAULT_LOCAL_CONFIDENCE,
        _ => DEFAULT_FALLBACK_CONFIDENCE,
    };
    metrics::counter!("swarmforge_decisions_total", "source" => source.to_string()).increment(1);
    Decision {
        swarm_id,
        text: response.text,
        source,
        confidence: response
            .confidence
            .unwrap_or(default_confidence)
            .clamp(0.0, 1.0),
        latency_ms: response.latency_ms,
        decided_at: Utc::now(),
    }
}
