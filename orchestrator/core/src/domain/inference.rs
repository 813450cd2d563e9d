// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Inference
//!
//! Reasoning backend interface consulted by swarm coordinators.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption layer between the decision router and
//!   concrete model servers (local inference, remote reasoning API)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Short identifier used in logs (e.g. `"ollama"`).
    fn name(&self) -> &str;

    /// Run `prompt` through the backend. Implementations should honour
    /// `timeout` themselves; callers enforce it as well.
    async fn infer(&self, prompt: &str, timeout: Duration) -> Result<InferenceResponse, InferenceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub text: String,
    pub latency_ms: u64,
    /// Backend-reported confidence in `[0.0, 1.0]`, when the backend has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}
