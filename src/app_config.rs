use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::alignment::splitter::{DEFAULT_BUFFER_UNITS, DEFAULT_PART_THRESHOLDS};
use crate::language::Language;

/// Application configuration module
/// This module handles loading, validating and saving the aligner settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Language of the original document (name or ISO code)
    pub source_language: String,

    /// Language of the translated document (name or ISO code)
    pub target_language: String,

    /// Alignment oracle settings
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Chunking and post-processing settings
    #[serde(default)]
    pub alignment: AlignmentConfig,

    /// Root directory for task output
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Oracle backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    // @provider: OpenRouter (OpenAI-compatible gateway)
    #[default]
    OpenRouter,
    // @provider: OpenAI
    OpenAI,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
    // @provider: Anthropic
    Anthropic,
}

impl ProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenRouter => "OpenRouter",
            Self::OpenAI => "OpenAI",
            Self::LMStudio => "LM Studio",
            Self::Anthropic => "Anthropic",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenRouter => "openrouter".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
            Self::Anthropic => "anthropic".to_string(),
        }
    }

    /// Environment variable consulted when no API key is configured
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::LMStudio => None,
        }
    }

    /// Local servers run without credentials
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::LMStudio)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openrouter" => Ok(Self::OpenRouter),
            "openai" => Ok(Self::OpenAI),
            "lmstudio" => Ok(Self::LMStudio),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Output budget per request, in tokens
    #[serde(default = "default_max_output_units")]
    pub max_output_units: u32,

    // @field: Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    // @param kind: Provider enum
    // @returns: Provider config with defaults
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            provider_type: kind.to_lowercase_string(),
            model: default_model(kind),
            api_key: String::new(),
            endpoint: default_endpoint(kind),
            max_output_units: default_max_output_units(),
            rate_limit: default_rate_limit(kind),
        }
    }
}

/// Oracle service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OracleConfig {
    /// Backend to use
    #[serde(default)]
    pub provider: ProviderKind,

    /// Configured backends
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Settings shared by every backend
    #[serde(default)]
    pub common: OracleCommonConfig,
}

/// Settings applicable to all oracle backends
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OracleCommonConfig {
    /// Sampling temperature; alignment wants near-deterministic output
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Memoise successful responses for identical requests
    #[serde(default = "default_true")]
    pub cache_responses: bool,
}

impl Default for OracleCommonConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
            cache_responses: true,
        }
    }
}

/// Chunking and post-processing settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AlignmentConfig {
    /// Overlap on each side of an interior chunk boundary, in units
    #[serde(default = "default_buffer_units")]
    pub buffer_units: usize,

    /// Unit thresholds; threshold `i` enables `i + 2` parts
    #[serde(default = "default_part_thresholds")]
    pub part_thresholds: Vec<usize>,

    /// Force a part count instead of deriving it from the thresholds
    #[serde(default)]
    pub forced_parts: Option<usize>,

    /// Re-split rows holding several sentences (non-logographic sources only)
    #[serde(default = "default_true")]
    pub enable_post_split: bool,

    /// Chunks aligned at the same time
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,

    /// Issues included in the task result
    #[serde(default = "default_max_issues_reported")]
    pub max_issues_reported: usize,

    /// Upper bound on a whole task
    #[serde(default = "default_max_task_duration_secs")]
    pub max_task_duration_secs: u64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            buffer_units: default_buffer_units(),
            part_thresholds: default_part_thresholds(),
            forced_parts: None,
            enable_post_split: true,
            max_concurrent_chunks: default_max_concurrent_chunks(),
            max_issues_reported: default_max_issues_reported(),
            max_task_duration_secs: default_max_task_duration_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_max_output_units() -> u32 {
    65_536
}

fn default_temperature() -> f32 {
    0.1
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_buffer_units() -> usize {
    DEFAULT_BUFFER_UNITS
}

fn default_part_thresholds() -> Vec<usize> {
    DEFAULT_PART_THRESHOLDS.to_vec()
}

fn default_max_concurrent_chunks() -> usize {
    1
}

fn default_max_issues_reported() -> usize {
    10
}

fn default_max_task_duration_secs() -> u64 {
    2 * 60 * 60
}

fn default_endpoint(kind: ProviderKind) -> String {
    match kind {
        ProviderKind::OpenRouter => "https://openrouter.ai/api/v1".to_string(),
        ProviderKind::OpenAI => "https://api.openai.com/v1".to_string(),
        ProviderKind::LMStudio => "http://localhost:1234/v1".to_string(),
        ProviderKind::Anthropic => "https://api.anthropic.com".to_string(),
    }
}

fn default_model(kind: ProviderKind) -> String {
    match kind {
        ProviderKind::OpenRouter => "google/gemini-2.5-pro".to_string(),
        ProviderKind::OpenAI => "gpt-4o".to_string(),
        // Placeholder; users should set the model loaded in LM Studio
        ProviderKind::LMStudio => "local-model".to_string(),
        ProviderKind::Anthropic => "claude-3-5-sonnet-latest".to_string(),
    }
}

fn default_rate_limit(kind: ProviderKind) -> Option<u32> {
    match kind {
        ProviderKind::OpenRouter | ProviderKind::OpenAI => Some(60),
        ProviderKind::Anthropic => Some(45),
        ProviderKind::LMStudio => None,
    }
}

impl Config {
    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Load `path`, falling back to the user config directory, and finally to
    /// a default configuration written to `path`
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::from_file(path);
        }

        if let Some(user_path) = user_config_path().filter(|p| p.exists()) {
            log::info!("Using configuration from {}", user_path.display());
            return Self::from_file(&user_path);
        }

        log::warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Resolved source language
    pub fn source(&self) -> Result<Language> {
        Language::resolve(&self.source_language)
    }

    /// Resolved target language
    pub fn target(&self) -> Result<Language> {
        Language::resolve(&self.target_language)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        self.source()
            .with_context(|| format!("Invalid source language: {}", self.source_language))?;
        self.target()
            .with_context(|| format!("Invalid target language: {}", self.target_language))?;

        let provider = self.oracle.provider;
        if provider.requires_api_key() && self.oracle.get_api_key().is_empty() {
            return Err(anyhow!(
                "An API key is required for the {} provider (set it in the config or via {})",
                provider.display_name(),
                provider.api_key_env_var().unwrap_or("the environment")
            ));
        }

        let endpoint = self.oracle.get_endpoint();
        url::Url::parse(&endpoint).with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;

        if self.oracle.get_model().trim().is_empty() {
            return Err(anyhow!("No model configured for the {} provider", provider.display_name()));
        }

        let thresholds = &self.alignment.part_thresholds;
        if thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(anyhow!("Part thresholds must be strictly increasing"));
        }

        if self.alignment.max_concurrent_chunks == 0 {
            return Err(anyhow!("max_concurrent_chunks must be at least 1"));
        }

        if self.alignment.forced_parts == Some(0) {
            return Err(anyhow!("forced_parts must be at least 1"));
        }

        Ok(())
    }
}

/// `<config dir>/docalign/config.json`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("docalign").join("config.json"))
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            oracle: OracleConfig::default(),
            alignment: AlignmentConfig::default(),
            output_dir: default_output_dir(),
            log_level: LogLevel::default(),
        }
    }
}

impl OracleConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, kind: &ProviderKind) -> Option<&ProviderConfig> {
        let provider_str = kind.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Mutable access to the active provider, inserting defaults when missing
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        let index = match self
            .available_providers
            .iter()
            .position(|p| p.provider_type == provider_str)
        {
            Some(index) => index,
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }
        default_model(self.provider)
    }

    /// Get the API key for the active provider, falling back to the environment
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
        }

        self.provider
            .api_key_env_var()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }
        default_endpoint(self.provider)
    }

    /// Get the output budget for the active provider
    pub fn get_max_output_units(&self) -> u32 {
        match self.get_active_provider_config() {
            Some(provider_config) if provider_config.max_output_units > 0 => {
                provider_config.max_output_units
            }
            _ => default_max_output_units(),
        }
    }

    /// Get the rate limit for the active provider
    pub fn get_rate_limit(&self) -> Option<u32> {
        if let Some(provider_config) = self.get_active_provider_config() {
            return provider_config.rate_limit;
        }
        default_rate_limit(self.provider)
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            available_providers: vec![
                ProviderConfig::new(ProviderKind::OpenRouter),
                ProviderConfig::new(ProviderKind::OpenAI),
                ProviderConfig::new(ProviderKind::LMStudio),
                ProviderConfig::new(ProviderKind::Anthropic),
            ],
            common: OracleCommonConfig::default(),
        }
    }
}
