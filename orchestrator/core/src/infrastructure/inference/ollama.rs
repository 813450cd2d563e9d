// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama Backend Adapter
//
// Local inference path for coordinator decisions. Runs next to the control
// plane, so it gets the short timeout.

use super::map_transport_error;
use crate::domain::inference::{InferenceBackend, InferenceError, InferenceResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

pub struct OllamaBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    done: bool,
}

impl OllamaBackend {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
        }
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn infer(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<InferenceResponse, InferenceError> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::Provider(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if !body.done {
            tracing::debug!(model = %self.model, "Ollama returned a truncated generation");
        }
        if body.response.trim().is_empty() {
            return Err(InferenceError::InvalidResponse("empty generation".to_string()));
        }

        Ok(InferenceResponse {
            text: body.response,
            latency_ms: started.elapsed().as_millis() as u64,
            confidence: None,
        })
    }
}
