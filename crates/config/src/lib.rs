//! Configuration loading, validation, and management for dekomposit.
//!
//! Loads configuration from `~/.dekomposit/config.toml`, then applies
//! environment variable overrides. Validates all settings at startup.
//!
//! Recognized environment variables:
//!
//! | variable | field |
//! |---|---|
//! | `CURRENT_LLM` | `llm.model` |
//! | `CURRENT_PROVIDER` | `llm.provider` |
//! | `CURRENT_API_KEY` | `llm.api_key_env` (name of the variable holding the key) |
//! | `LLM_TEMPERATURE` | `llm.temperature` |
//! | `LLM_MAX_TOKENS` | `llm.max_tokens` |
//! | `CURRENT_PROVIDER_ENDPOINTS` | `llm.endpoints` (JSON object, replaces the map) |
//! | `GOOGLE_CLOUD_PROJECT` / `PROJECT_ID` | `translation.project_id` |
//! | `ADAPTIVE_MT_LOCATION` | `translation.location` |
//! | `ADAPTIVE_MT_DATASET_ID` | `translation.dataset_id` |
//! | `ADAPTIVE_MT_DATASET_NAME` | `translation.dataset_name` |
//! | `DEKOMPOSIT_PROMPTS_DIR` | `prompts.dir` |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.dekomposit/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM provider settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Tool loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Memory capacities
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Prompt file location
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Adaptive MT translation settings
    #[serde(default)]
    pub translation: TranslationConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider key into `endpoints` (e.g., "gemini", "openrouter")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable that holds the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API key set directly in the file (takes precedence over `api_key_env`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout for every LLM request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// OpenAI-compatible base URL per provider
    #[serde(default = "default_endpoints")]
    pub endpoints: BTreeMap<String, String>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-flash-lite-latest".into()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_request_timeout() -> u64 {
    30
}
fn default_endpoints() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("gemini".into(), "https://generativelanguage.googleapis.com/v1beta/openai/".into()),
        ("openai".into(), "https://api.openai.com/v1".into()),
        ("openrouter".into(), "https://openrouter.ai/api/v1".into()),
    ])
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
            endpoints: default_endpoints(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key_env", &self.api_key_env)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl LlmConfig {
    /// Base URL for the selected provider.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint_for(&self.provider)
    }

    pub fn endpoint_for(&self, provider: &str) -> Option<&str> {
        self.endpoints
            .get(&provider.trim().to_lowercase())
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }

    /// The API key: inline value first, then the variable named by `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model calls per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Timeout for a single tool invocation
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Run the tool calls of one model turn concurrently
    #[serde(default = "default_true")]
    pub concurrent_tool_dispatch: bool,

    /// Reply used when the iteration cap is reached
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// Reply used when the provider fails
    #[serde(default = "default_error_message")]
    pub error_message: String,

    /// Target language used when a translate request names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_tool_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_fallback_message() -> String {
    "Sorry, I couldn't finish that request. Please try rephrasing it.".into()
}
fn default_error_message() -> String {
    "Sorry, I couldn't process that. Please try again.".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_timeout_secs: default_tool_timeout(),
            concurrent_tool_dispatch: true,
            fallback_message: default_fallback_message(),
            error_message: default_error_message(),
            target_language: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_notes")]
    pub max_notes: usize,

    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_max_notes() -> usize {
    20
}
fn default_max_history() -> usize {
    50
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_notes: default_max_notes(),
            max_history: default_max_history(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Directory of `*.md` prompt files (default: `~/.dekomposit/prompts`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl PromptsConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("prompts"))
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,

    /// Full resource name; wins over `dataset_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,

    /// Static OAuth token; otherwise taken from the environment or gcloud
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_location() -> String {
    "us-central1".into()
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: default_location(),
            dataset_id: None,
            dataset_name: None,
            access_token: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for TranslationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationConfig")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("dataset_id", &self.dataset_id)
            .field("dataset_name", &self.dataset_name)
            .field("access_token", &redact(&self.access_token))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.dekomposit/config.toml)
    /// with environment overrides applied.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path, |key| std::env::var(key).ok())
    }

    /// Load from `path`, then apply overrides from `lookup` and validate.
    pub fn load_with_env(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides. Blank values are ignored.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(model) = get("CURRENT_LLM") {
            self.llm.model = model;
        }
        if let Some(provider) = get("CURRENT_PROVIDER") {
            self.llm.provider = provider.to_lowercase();
        }
        if let Some(key_env) = get("CURRENT_API_KEY") {
            self.llm.api_key_env = key_env;
        }
        if let Some(raw) = get("LLM_TEMPERATURE") {
            self.llm.temperature = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!("LLM_TEMPERATURE is not a number: {raw}"))
            })?;
        }
        if let Some(raw) = get("LLM_MAX_TOKENS") {
            self.llm.max_tokens = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!("LLM_MAX_TOKENS is not an integer: {raw}"))
            })?;
        }
        if let Some(raw) = get("CURRENT_PROVIDER_ENDPOINTS") {
            let parsed: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
                ConfigError::ValidationError(format!(
                    "CURRENT_PROVIDER_ENDPOINTS must be a JSON object of strings: {e}"
                ))
            })?;
            self.llm.endpoints = parsed
                .into_iter()
                .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
                .collect();
        }
        if let Some(project) = get("GOOGLE_CLOUD_PROJECT").or_else(|| get("PROJECT_ID")) {
            self.translation.project_id = Some(project);
        }
        if let Some(location) = get("ADAPTIVE_MT_LOCATION") {
            self.translation.location = location;
        }
        if let Some(dataset_id) = get("ADAPTIVE_MT_DATASET_ID") {
            self.translation.dataset_id = Some(dataset_id);
        }
        if let Some(dataset_name) = get("ADAPTIVE_MT_DATASET_NAME") {
            self.translation.dataset_name = Some(dataset_name);
        }
        if let Some(dir) = get("DEKOMPOSIT_PROMPTS_DIR") {
            self.prompts.dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".dekomposit")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.llm.endpoint().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "no endpoint configured for provider '{}'; add it to llm.endpoints \
                 or CURRENT_PROVIDER_ENDPOINTS",
                self.llm.provider
            )));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.memory.max_notes == 0 || self.memory.max_history == 0 {
            return Err(ConfigError::ValidationError(
                "memory capacities must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `init-config`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// The effective config as TOML with secrets removed.
    pub fn redacted_toml(&self) -> String {
        let mut config = self.clone();
        config.llm.api_key = None;
        config.translation.access_token = None;
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
