use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ModelSpec, Oracle, OracleRequest, OracleResponse, RateLimiter, RetryPolicy};
use crate::app_config::ProviderKind;
use crate::errors::{AppError, ProviderError};

/// Client for OpenAI-compatible chat completion APIs (OpenAI, OpenRouter, LM Studio)
#[derive(Debug)]
pub struct OpenAICompatible {
    /// HTTP client for API requests
    client: Client,
    /// Target model
    spec: ModelSpec,
    /// API key for authentication (may be empty for local servers)
    api_key: String,
    /// Base URL ending before `/chat/completions`
    endpoint: String,
    timeout_secs: u64,
    retry: RetryPolicy,
    limiter: RateLimiter,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

/// Chat message
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role: role.into(),
            content: Some(content.into()),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl OpenAICompatible {
    /// Create a new client
    pub fn new(
        spec: ModelSpec,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
        rate_limit: Option<u32>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client: super::build_http_client(timeout)?,
            spec,
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout_secs: timeout.as_secs(),
            retry,
            limiter: RateLimiter::new(rate_limit),
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    fn build_request(&self, request: &OracleRequest) -> ChatRequest {
        let max_tokens = request.max_output_units.unwrap_or(self.spec.max_output_units);
        let mut chat = ChatRequest::new(&self.spec.model_id, max_tokens);
        if !request.system.is_empty() {
            chat = chat.add_message("system", &request.system);
        }
        chat = chat.add_message("user", &request.user);
        if let Some(t) = request.temperature {
            chat = chat.temperature(t);
        }
        chat
    }

    /// Send one chat completion request
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.limiter.acquire().await;

        let mut builder = self.client.post(self.url()).json(request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        if self.spec.provider == ProviderKind::OpenRouter {
            builder = builder
                .header("HTTP-Referer", "https://github.com/docalign/docalign")
                .header("X-Title", "docalign");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| super::transport_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            return Err(super::status_error(status.as_u16(), error_text));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Extract text from a chat response
    pub fn extract_text(response: &ChatResponse) -> String {
        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Oracle for OpenAICompatible {
    async fn invoke(&self, request: OracleRequest) -> Result<OracleResponse, ProviderError> {
        let chat = self.build_request(&request);
        let label = self.spec.provider.display_name().to_string();

        let response = self.retry.run(&label, || self.complete(&chat)).await?;

        let text = Self::extract_text(&response);
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(self.spec.to_string()));
        }

        let truncated = response
            .choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .is_some_and(|reason| reason == "length");
        if truncated {
            warn!("{} stopped at its output limit ({} tokens)", self.spec, chat.max_tokens);
        }

        let usage = response.usage.as_ref();
        debug!(
            "{} replied with {} chars (in: {:?}, out: {:?})",
            self.spec,
            text.len(),
            usage.and_then(|u| u.prompt_tokens),
            usage.and_then(|u| u.completion_tokens)
        );

        Ok(OracleResponse {
            model: response.model.clone().unwrap_or_else(|| self.spec.model_id.clone()),
            input_tokens: usage.and_then(|u| u.prompt_tokens),
            output_tokens: usage.and_then(|u| u.completion_tokens),
            truncated,
            text,
        })
    }

    fn model(&self) -> &ModelSpec {
        &self.spec
    }
}
