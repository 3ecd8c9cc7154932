//! Configuration for a pipeline run
//!
//! Loaded from a TOML file. Every section is optional; an empty file yields the
//! defaults below. Secrets are never stored in the file itself, only the names
//! of the environment variables that hold them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default)]
    pub todoist: TodoistSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub prompts: PromptSection,
    /// Keyword table for context documents, in priority order. Empty means built-in table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<ContextRuleConfig>,
}

/// Todoist task source settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TodoistSection {
    #[serde(default = "default_todoist_token_env")]
    pub api_token_env: String,
    #[serde(default = "default_todoist_base_url")]
    pub base_url: String,
    /// Maximum number of tasks processed per run
    pub task_limit: Option<usize>,
}

impl Default for TodoistSection {
    fn default() -> Self {
        Self {
            api_token_env: default_todoist_token_env(),
            base_url: default_todoist_base_url(),
            task_limit: None,
        }
    }
}

fn default_todoist_token_env() -> String {
    "TODOIST_API_TOKEN".to_string()
}

fn default_todoist_base_url() -> String {
    "https://api.todoist.com/rest/v2".to_string()
}

/// Language model settings shared by every LLM call of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name: "openai", "anthropic" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier; provider default when absent
    pub model: Option<String>,
    /// Environment variable containing the API key
    pub api_key_env: Option<String>,
    /// Override for the provider endpoint
    pub base_url: Option<String>,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key_env: None,
            base_url: None,
            temperature: default_llm_temperature(),
            max_tokens: None,
            system_prompt: None,
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_llm_temperature() -> f32 {
    0.3
}

pub const SUPPORTED_PROVIDERS: &[&str] = &["openai", "anthropic", "ollama"];

impl LlmSection {
    /// Model to use, falling back to the provider's default
    pub fn model_name(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match self.provider.as_str() {
            "openai" => "gpt-4o-mini",
            "anthropic" => "claude-3-5-haiku-20241022",
            _ => "deepseek-r1:8b",
        }
        .to_string()
    }

    /// Name of the environment variable holding the API key, if the provider needs one
    pub fn api_key_env_name(&self) -> Option<String> {
        if let Some(name) = &self.api_key_env {
            return Some(name.clone());
        }
        match self.provider.as_str() {
            "openai" => Some("OPENAI_API_KEY".to_string()),
            "anthropic" => Some("ANTHROPIC_API_KEY".to_string()),
            _ => None,
        }
    }
}

/// Router settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingSection {
    #[serde(default)]
    pub strategy: RoutingStrategy,
    /// Maximum routing decisions per task before forced completion
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Temperature for routing decisions
    #[serde(default = "default_routing_temperature")]
    pub temperature: f32,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::default(),
            max_iterations: default_max_iterations(),
            temperature: default_routing_temperature(),
        }
    }
}

/// Routing strategy selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoutingStrategy {
    /// Model decides, static table as safety net
    #[default]
    Llm,
    /// Static table only
    Static,
}

fn default_max_iterations() -> usize {
    5
}

fn default_routing_temperature() -> f32 {
    0.2
}

/// Web search settings for the planning processor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchSection {
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
    /// Character budget for search results inside the planning prompt
    #[serde(default = "default_search_max_chars")]
    pub max_chars: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            base_url: default_search_base_url(),
            max_results: default_search_max_results(),
            max_chars: default_search_max_chars(),
        }
    }
}

fn default_search_key_env() -> String {
    "SERPER_API_KEY".to_string()
}

fn default_search_base_url() -> String {
    "https://google.serper.dev".to_string()
}

fn default_search_max_results() -> usize {
    5
}

fn default_search_max_chars() -> usize {
    2000
}

/// Retry and timeout policy for outbound calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Hard timeout for a single attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RetrySection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    4000
}

fn default_timeout_secs() -> u64 {
    120
}

/// Output and input directories
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSection {
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default = "default_learning_dir")]
    pub learning_dir: PathBuf,
    #[serde(default = "default_contexts_dir")]
    pub contexts_dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
            learning_dir: default_learning_dir(),
            contexts_dir: default_contexts_dir(),
        }
    }
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_learning_dir() -> PathBuf {
    PathBuf::from("learning_tasks")
}

fn default_contexts_dir() -> PathBuf {
    PathBuf::from("contexts")
}

/// Prompt rendering settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptSection {
    /// Number of comments rendered verbatim into processor prompts
    #[serde(default = "default_max_comments")]
    pub max_comments: usize,
}

impl Default for PromptSection {
    fn default() -> Self {
        Self {
            max_comments: default_max_comments(),
        }
    }
}

fn default_max_comments() -> usize {
    2
}

/// One entry of the context keyword table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextRuleConfig {
    /// File name inside the contexts directory
    pub file: String,
    pub keywords: Vec<String>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges and cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider '{}', expected one of: {}",
                self.llm.provider,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidConfig(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.routing.max_iterations == 0 {
            return Err(ConfigError::InvalidConfig(
                "routing.max_iterations must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.retry.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "retry.timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.search.max_chars == 0 {
            return Err(ConfigError::InvalidConfig(
                "search.max_chars must be at least 1".to_string(),
            ));
        }

        if self.todoist.task_limit == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "todoist.task_limit must be at least 1 when set".to_string(),
            ));
        }

        validate_url("todoist.base_url", &self.todoist.base_url)?;
        validate_url("search.base_url", &self.search.base_url)?;
        if let Some(base_url) = &self.llm.base_url {
            validate_url("llm.base_url", base_url)?;
        }

        for rule in &self.contexts {
            if rule.file.trim().is_empty() || rule.keywords.is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "context entry '{}' needs a file name and at least one keyword",
                    rule.file
                )));
            }
        }

        Ok(())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get the Todoist API token from its environment variable
    pub fn get_todoist_token(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.todoist.api_token_env)
    }

    /// Get the LLM API key, `None` for providers that need no key
    pub fn get_llm_api_key(&self) -> Result<Option<String>, ConfigError> {
        match self.llm.api_key_env_name() {
            Some(name) => Self::get_env_var_required(&name).map(Some),
            None => Ok(None),
        }
    }

    /// Get the web search API key; search is optional so absence is not an error
    pub fn get_search_api_key(&self) -> Option<String> {
        Self::get_env_var_required(&self.search.api_key_env).ok()
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidConfig(format!("{field} is not a valid URL ({value}): {e}")))
}
