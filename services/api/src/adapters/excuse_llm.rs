//! services/api/src/adapters/excuse_llm.rs
//!
//! This module contains the adapter for the excuse-writing LLM.
//! It implements the `TextGenerationService` port from the `core` crate against any
//! OpenAI-compatible Chat Completions endpoint.

use async_trait::async_trait;
use excuse_core::ports::{CompletionRequest, PortError, PortResult, TextGenerationService};
use reqwest::{header::RETRY_AFTER, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    n: u8,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` using an OpenAI-compatible LLM.
pub struct OpenAiExcuseAdapter {
    client: reqwest::Client,
    /// Never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for OpenAiExcuseAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiExcuseAdapter")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiExcuseAdapter {
    /// Creates a new `OpenAiExcuseAdapter`.
    ///
    /// `timeout` bounds the whole HTTP exchange; the orchestrator applies its own
    /// timeout on top.
    pub fn new(
        api_key: SecretString,
        api_base: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature,
        })
    }
}

/// Maps a non-success status to the port taxonomy.
fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> PortError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => PortError::RateLimited {
            retry_after_secs: retry_after,
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => PortError::Unexpected(format!(
            "text generation rejected the request ({}): {}",
            status, body
        )),
        _ => PortError::ServiceUnavailable(format!("text generation API error ({})", status)),
    }
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for OpenAiExcuseAdapter {
    async fn complete(&self, request: &CompletionRequest) -> PortResult<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: self.temperature,
            n: 1,
        };
        let url = format!("{}/chat/completions", self.api_base);
        debug!(model = %self.model, language = %request.language, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Completion request failed: {}", e);
                PortError::ServiceUnavailable(format!("text generation request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "Text generation API returned an error");
            return Err(status_error(status, retry_after, &text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            PortError::ServiceUnavailable(format!("failed to parse completion response: {}", e))
        })?;

        // Extract the text content from the first choice in the response.
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(PortError::EmptyResponse);
        }
        Ok(content)
    }
}
