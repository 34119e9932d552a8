use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ModelSpec, Oracle, OracleRequest, OracleResponse, RateLimiter, RetryPolicy};
use crate::errors::{AppError, ProviderError};

/// Anthropic client for interacting with Anthropic API
#[derive(Debug)]
pub struct Anthropic {
    /// HTTP client for API requests
    client: Client,
    spec: ModelSpec,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
    timeout_secs: u64,
    retry: RetryPolicy,
    limiter: RateLimiter,
}

/// Anthropic message request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<AnthropicMessage>,

    /// System prompt to guide the AI
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    max_tokens: u32,
}

/// Anthropic message format
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role of the message sender (user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u32,
    /// Number of output tokens
    pub output_tokens: u32,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// The content of the response
    pub content: Vec<AnthropicContent>,
    /// Token usage information
    pub usage: TokenUsage,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    /// The type of content
    #[serde(rename = "type")]
    pub content_type: String,

    /// The actual text content
    #[serde(default)]
    pub text: String,
}

impl AnthropicRequest {
    /// Create a new Anthropic request
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            temperature: None,
            max_tokens,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(AnthropicMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Anthropic {
    /// Create a new Anthropic client
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
            endpoint: endpoint.into(),
            timeout_secs: timeout.as_secs(),
            retry,
            limiter: RateLimiter::new(rate_limit),
        })
    }

    fn url(&self) -> String {
        if self.endpoint.is_empty() {
            "https://api.anthropic.com/v1/messages".to_string()
        } else {
            format!("{}/v1/messages", self.endpoint.trim_end_matches('/'))
        }
    }

    fn build_request(&self, request: &OracleRequest) -> AnthropicRequest {
        let max_tokens = request.max_output_units.unwrap_or(self.spec.max_output_units);
        let mut message = AnthropicRequest::new(&self.spec.model_id, max_tokens)
            .add_message("user", &request.user);
        if !request.system.is_empty() {
            message = message.system(&request.system);
        }
        if let Some(t) = request.temperature {
            message = message.temperature(t);
        }
        message
    }

    /// Complete a messages request
    pub async fn complete(&self, request: &AnthropicRequest) -> Result<AnthropicResponse, ProviderError> {
        self.limiter.acquire().await;

        let response = self
            .client
            .post(self.url())
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(request)
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
            .json::<AnthropicResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Extract text from Anthropic response
    pub fn extract_text_from_response(response: &AnthropicResponse) -> String {
        response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect()
    }
}

#[async_trait]
impl Oracle for Anthropic {
    async fn invoke(&self, request: OracleRequest) -> Result<OracleResponse, ProviderError> {
        let message = self.build_request(&request);
        let response = self.retry.run("Anthropic", || self.complete(&message)).await?;

        let text = Self::extract_text_from_response(&response);
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(self.spec.to_string()));
        }

        let truncated = response.stop_reason.as_deref() == Some("max_tokens");
        if truncated {
            warn!("{} stopped at its output limit ({} tokens)", self.spec, message.max_tokens);
        }
        debug!(
            "{} replied with {} chars (in: {}, out: {})",
            self.spec,
            text.len(),
            response.usage.input_tokens,
            response.usage.output_tokens
        );

        Ok(OracleResponse {
            text,
            model: self.spec.model_id.clone(),
            input_tokens: Some(response.usage.input_tokens as u64),
            output_tokens: Some(response.usage.output_tokens as u64),
            truncated,
        })
    }

    fn model(&self) -> &ModelSpec {
        &self.spec
    }
}
