// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reasoning Backend Adapters
//!
//! Anti-corruption layer between the decision router and model servers:
//! - **OllamaBackend** - local inference server, the primary path
//! - **OpenAiCompatibleBackend** - remote chat-completions API, the fallback
//! - **UnavailableBackend** - stands in for a slot left unconfigured

pub mod ollama;
pub mod openai;

pub use ollama::OllamaBackend;
pub use openai::OpenAiCompatibleBackend;

use crate::domain::config::BackendConfig;
use crate::domain::inference::{InferenceBackend, InferenceError, InferenceResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Instantiate the adapter named by `config.provider_type`.
pub fn build_backend(config: &BackendConfig) -> anyhow::Result<Arc<dyn InferenceBackend>> {
    match config.provider_type.as_str() {
        "ollama" => Ok(Arc::new(OllamaBackend::new(
            config.endpoint.clone(),
            config.model.clone(),
        ))),
        "openai-compatible" => Ok(Arc::new(OpenAiCompatibleBackend::new(
            config.endpoint.clone(),
            config.resolve_api_key()?,
            config.model.clone(),
        ))),
        other => anyhow::bail!("Unsupported inference backend type: {}", other),
    }
}

/// Backend for an unconfigured slot. Every call fails immediately, which the
/// router treats like any other backend failure.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    slot: String,
}

impl UnavailableBackend {
    pub fn new(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }
}

#[async_trait]
impl InferenceBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn infer(
        &self,
        _prompt: &str,
        _timeout: Duration,
    ) -> Result<InferenceResponse, InferenceError> {
        Err(InferenceError::NotConfigured(self.slot.clone()))
    }
}

/// Map transport failures, keeping timeouts distinguishable.
pub(crate) fn map_transport_error(err: reqwest::Error, timeout: Duration) -> InferenceError {
    if err.is_timeout() {
        InferenceError::Timeout(timeout)
    } else {
        InferenceError::Network(err.to_string())
    }
}
