/*!
 * Alignment oracle backends.
 *
 * The oracle is the language-model completion service that performs the
 * actual alignment judgment. Every backend implements the single
 * [`Oracle::invoke`] entry point:
 * - OpenAI-compatible: OpenAI, OpenRouter, LM Studio
 * - Anthropic: messages API
 * - Mock: scripted responses for tests
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::{Config, ProviderKind};
use crate::errors::{AppError, ProviderError};

pub mod anthropic;
pub mod cache;
pub mod mock;
pub mod openai;

/// A model on a specific backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    /// Output budget per request, in tokens
    pub max_output_units: u32,
}

impl ModelSpec {
    pub fn new(provider: ProviderKind, model_id: impl Into<String>, max_output_units: u32) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            max_output_units,
        }
    }
}

impl std::fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.model_id)
    }
}

/// A system instruction plus user payload
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub system: String,
    pub user: String,
    pub temperature: Option<f32>,
    /// Overrides the model's default output budget
    pub max_output_units: Option<u32>,
}

impl OracleRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: None,
            max_output_units: None,
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the output budget
    pub fn max_output_units(mut self, units: u32) -> Self {
        self.max_output_units = Some(units);
        self
    }
}

/// Text returned by a backend
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OracleResponse {
    pub text: String,
    pub model: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    /// The backend reported stopping at its output limit
    pub truncated: bool,
}

/// Common trait for all oracle backends
#[async_trait]
pub trait Oracle: Send + Sync + Debug {
    /// Complete one request
    async fn invoke(&self, request: OracleRequest) -> Result<OracleResponse, ProviderError>;

    /// The model this backend talks to
    fn model(&self) -> &ModelSpec;

    /// Test the connection with a minimal request
    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = OracleRequest::new("Reply with OK.", "ping").max_output_units(8);
        self.invoke(request).await.map(|_| ())
    }
}

/// Retry and pacing behaviour shared by the HTTP backends
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_base_ms,
        }
    }

    /// Exponential backoff with up to 25% jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
        let jitter = if base >= 4 {
            rand::rng().random_range(0..=base / 4)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    log::warn!(
                        "{} request failed: {} - retrying in {:?} (attempt {}/{})",
                        label,
                        e,
                        delay,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    log::error!("{} request failed: {}", label, e);
                    return Err(e);
                }
            }
        }
    }
}

/// Client-side requests-per-minute limiter
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: Option<u32>) -> Self {
        let min_interval = requests_per_minute
            .filter(|&rpm| rpm > 0)
            .map(|rpm| Duration::from_millis(60_000 / rpm as u64));
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait until the next request slot
    pub async fn acquire(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };

        let wait = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + interval);
            slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// Map an HTTP error status onto a provider error
pub(crate) fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationError(body),
        429 => ProviderError::RateLimitExceeded(body),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

/// Map a transport error onto a provider error
pub(crate) fn transport_error(error: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

/// Build the configured oracle, wrapped in a response cache when enabled
pub fn from_config(config: &Config) -> Result<Arc<dyn Oracle>, AppError> {
    let oracle_config = &config.oracle;
    let spec = ModelSpec::new(
        oracle_config.provider,
        oracle_config.get_model(),
        oracle_config.get_max_output_units(),
    );
    let retry = RetryPolicy::new(
        oracle_config.common.retry_count,
        oracle_config.common.retry_backoff_ms,
    );
    let timeout = Duration::from_secs(oracle_config.common.timeout_secs);
    let api_key = oracle_config.get_api_key();
    let endpoint = oracle_config.get_endpoint();
    let rate_limit = oracle_config.get_rate_limit();

    let oracle: Arc<dyn Oracle> = match oracle_config.provider {
        ProviderKind::Anthropic => Arc::new(anthropic::Anthropic::new(
            spec, api_key, endpoint, timeout, retry, rate_limit,
        )?),
        ProviderKind::OpenRouter | ProviderKind::OpenAI | ProviderKind::LMStudio => Arc::new(
            openai::OpenAICompatible::new(spec, api_key, endpoint, timeout, retry, rate_limit)?,
        ),
    };

    if oracle_config.common.cache_responses {
        Ok(Arc::new(cache::CachedOracle::new(oracle)))
    } else {
        Ok(oracle)
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}
