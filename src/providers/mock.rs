/*!
 * Mock oracle implementations for testing.
 *
 * This module provides a mock oracle that simulates different behaviors:
 * - `MockOracle::working()` - Aligns the two streams line by line
 * - `MockOracle::fixed(text)` - Always answers with the same text
 * - `MockOracle::scripted(responses)` - Answers in order, then repeats the last one
 * - `MockOracle::failing()` - Always fails with an error
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::alignment::prompts;
use crate::app_config::ProviderKind;
use crate::errors::ProviderError;
use crate::providers::{ModelSpec, Oracle, OracleRequest, OracleResponse};

/// Behavior mode for the mock oracle
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Pairs the lines of both streams in order
    Working,
    /// Always returns the given text
    Fixed(String),
    /// Returns the given texts in order, repeating the last one
    Scripted(Vec<String>),
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Succeeds without any text
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock oracle for testing alignment behavior
#[derive(Debug)]
pub struct MockOracle {
    behavior: MockBehavior,
    spec: ModelSpec,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Every request received, in order
    requests: Arc<Mutex<Vec<OracleRequest>>>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&OracleRequest) -> String>,
}

impl MockOracle {
    /// Create a new mock oracle with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            spec: ModelSpec::new(ProviderKind::OpenRouter, "mock/aligner", 4096),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Fixed(text.into()))
    }

    pub fn scripted<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self::new(MockBehavior::Scripted(responses.into_iter().map(Into::into).collect()))
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator, used by the succeeding behaviors
    pub fn with_custom_response(mut self, generator: fn(&OracleRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Snapshot of the requests received so far
    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().clone()
    }

    /// Pair the source and target stream lines of an alignment payload
    pub fn align_streams(request: &OracleRequest) -> String {
        let (Some(source), Some(target)) = (
            prompts::extract_stream(&request.user, prompts::SOURCE_STREAM_TAG),
            prompts::extract_stream(&request.user, prompts::TARGET_STREAM_TAG),
        ) else {
            return prompts::extract_split_row(&request.user)
                .map(|(s, t)| format!("{} ||| {}\n", s, t))
                .unwrap_or_default();
        };

        let source_lines: Vec<&str> = source.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let target_lines: Vec<&str> = target
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && crate::alignment::parser::delimiter_label(l).is_none())
            .collect();

        let mut out = String::new();
        let mut targets = target_lines.into_iter();
        for line in source_lines {
            if crate::alignment::parser::delimiter_label(line).is_some() {
                out.push_str(line);
                out.push('\n');
                continue;
            }
            out.push_str(&format!("{} ||| {}\n", line, targets.next().unwrap_or("")));
        }
        for rest in targets {
            out.push_str(&format!("||| {}\n", rest));
        }
        out
    }

    fn success_text(&self, request: &OracleRequest, fallback: impl FnOnce() -> String) -> String {
        match self.custom_response {
            Some(generator) => generator(request),
            None => fallback(),
        }
    }

    fn respond(&self, text: String) -> Result<OracleResponse, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(self.spec.to_string()));
        }
        Ok(OracleResponse {
            output_tokens: Some((text.len() / 4) as u64),
            text,
            model: self.spec.model_id.clone(),
            input_tokens: Some(10),
            truncated: false,
        })
    }
}

impl Clone for MockOracle {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior.clone(),
            spec: self.spec.clone(),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn invoke(&self, request: OracleRequest) -> Result<OracleResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        match &self.behavior {
            MockBehavior::Working => {
                let text = self.success_text(&request, || Self::align_streams(&request));
                self.respond(text)
            }

            MockBehavior::Fixed(text) => {
                let text = self.success_text(&request, || text.clone());
                self.respond(text)
            }

            MockBehavior::Scripted(responses) => {
                let text = responses
                    .get(count)
                    .or_else(|| responses.last())
                    .cloned()
                    .unwrap_or_default();
                self.respond(text)
            }

            MockBehavior::Intermittent { fail_every } => {
                if *fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    let text = self.success_text(&request, || Self::align_streams(&request));
                    self.respond(text)
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => self.respond(String::new()),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(*delay_ms)).await;
                let text = self.success_text(&request, || Self::align_streams(&request));
                self.respond(text)
            }
        }
    }

    fn model(&self) -> &ModelSpec {
        &self.spec
    }
}
