// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI-Compatible Backend Adapter
//
// Remote reasoning API used when local inference fails or times out. Works
// with any chat-completions endpoint (OpenAI, vLLM, LM Studio, gateways).

use super::map_transport_error;
use crate::domain::inference::{InferenceBackend, InferenceError, InferenceResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl OpenAiCompatibleBackend {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl InferenceBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn infer(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<InferenceResponse, InferenceError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        let started = Instant::now();

        let mut builder = self.client.post(&url).timeout(timeout).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let response = builder
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

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::InvalidResponse("No choices in response".to_string()))?;

        Ok(InferenceResponse {
            text: choice.message.content,
            latency_ms: started.elapsed().as_millis() as u64,
            confidence: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chat_completion_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"add two reviewers"},"finish_reason":"stop"}]}"#,
            )
            .create_async()
            .await;

        let backend =
            OpenAiCompatibleBackend::new(server.url(), "sk-test".to_string(), "gpt-4o".to_string());
        let response = backend
            .infer("what next?", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.text, "add two reviewers");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let backend = OpenAiCompatibleBackend::new(server.url(), String::new(), "m".to_string());
        assert!(matches!(
            backend.infer("x", Duration::from_secs(5)).await,
            Err(InferenceError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_is_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let backend = OpenAiCompatibleBackend::new(server.url(), "k".to_string(), "m".to_string());
        assert!(matches!(
            backend.infer("x", Duration::from_secs(5)).await,
            Err(InferenceError::Provider(msg)) if msg.contains("429")
        ));
    }
}
